//! varflow: pipeline de anotación de variantes genómicas.
//!
//! Este crate une las piezas del workspace:
//! - `config` carga `GENOMICS_*` y normaliza valores a tipos cerrados.
//! - `pipeline` arma las siete etapas y las ejecuta sobre un `RunContext`.
//! - `errors` define el error de la fachada.
//!
//! El motor (`varflow-core`), el dominio (`varflow-domain`) y los adaptadores
//! de herramientas externas (`varflow-adapters`) se re-exportan para clientes
//! que necesiten piezas sueltas.

pub mod config;
pub mod errors;
pub mod pipeline;

pub use config::{Database, PipelineConfig, ReferenceVersion};
pub use errors::PipelineError;
pub use pipeline::{run_full_pipeline, Pipeline, PipelineInput};
pub use varflow_adapters as adapters;
pub use varflow_core as engine;
pub use varflow_domain as domain;

#[cfg(test)]
mod tests {
    use super::errors::PipelineError;
    use varflow_core::CoreEngineError;

    #[test]
    fn engine_errors_keep_their_text() {
        let e: PipelineError = CoreEngineError::Cancelled.into();
        assert_eq!(e.to_string(), "run cancelled");
        assert_eq!(PipelineError::Input("x".into()).to_string(), "invalid input: x");
    }
}
