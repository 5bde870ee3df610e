//! Constantes del motor.

/// Versión lógica del motor. Forma parte del hash de definición: un cambio
/// de versión produce otra huella aunque la secuencia de etapas sea igual.
pub const ENGINE_VERSION: &str = "V1.0";

/// Nombre de herramienta que aparece en la procedencia de los artefactos.
pub const SOURCE_NAME: &str = "varflow";

/// Formato temporal del identificador de ejecución (milisegundos incluidos).
pub const RUN_ID_TIME_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Nombre del log de eventos dentro del directorio de ejecución.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Subdirectorio de ficheros temporales por invocación.
pub const SCRATCH_DIR: &str = "scratch";

/// Máximo de entradas de muestra por categoría en el resumen del ledger.
pub const LEDGER_SAMPLE_LIMIT: usize = 5;

/// Resumen final de la ejecución dentro del directorio de ejecución.
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
