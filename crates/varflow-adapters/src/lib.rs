//! varflow-adapters: invocación de herramientas externas, resolución
//! concurrente de coordenadas, ensamblado del VCF, anotación multi-fuente y
//! las etapas concretas del pipeline.
pub mod assembler;
pub mod errors;
pub mod fanout;
pub mod invoker;
pub mod resolver;
pub mod stages;

pub use assembler::{assemble_records, remediation_for, AssemblyOutcome, FailureReport};
pub use errors::ToolError;
pub use fanout::{bounded_fan_out, MultiSourceAnnotator, MultiSourceSettings, SourceResult};
pub use invoker::{invoke_with_timeout, ProcessInvoker, ToolInvocation, ToolInvoker, ToolOutput};
pub use resolver::{CoordinateResolver, IndexedDescriptor, ResolverSettings};
pub use stages::{AnnotateAStage, AnnotateBStage, AssembleStage, ExternalTool, ExtractStage, InputSource, ResolveStage,
                 TabulateStage, ValidateStage};
