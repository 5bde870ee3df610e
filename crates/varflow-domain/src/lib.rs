//! varflow-domain: tipos del dominio de variantes (descriptores, registros,
//! formas, taxonomía de fallos). Sin E/S ni dependencias del motor.
pub mod descriptor;
pub mod error;
pub mod failure;
pub mod knowledge;
pub mod notation;
pub mod positional;
pub mod record;
pub mod shape;
pub mod tool_output;

pub use descriptor::{CoordinateType, VariantDescriptor};
pub use error::DomainError;
pub use failure::{ClassificationRule, ClassificationTable, FailureCategory, FailureFamily};
pub use knowledge::KnowledgeSourceSpec;
pub use notation::normalize_protein;
pub use positional::{inspect_vcf, render_vcf, PositionalRecord, VcfProvenance};
pub use record::{CoordinateRecord, FailureOrigin, ResolutionFailure, ResolutionOutcome};
pub use shape::{assemble_record, classify_shape, normalize_alleles, AssemblyFailure, NormalizedAlleles, UnsupportedShape,
                VariantShape};
pub use tool_output::{parse_tool_output, ParsedCoordinates};
