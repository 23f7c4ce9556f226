pub mod annotate;
pub mod dispatch;
pub mod document;
pub mod entity;
pub mod error;
pub mod exec;
pub mod extract;
pub mod media;
pub mod normalize;
pub mod report;
pub mod standardize;
pub mod tools;

pub use annotate::Annotator;
pub use dispatch::Dispatcher;
pub use document::{Document, InputKind};
pub use entity::{Annotations, EntityClass, EntityRecord, EntitySource, Geometry};
pub use error::{Error, Result};
pub use extract::{ExtractOutput, Extractor};
pub use media::{OcrOptions, RenderOptions};
pub use normalize::TextNormalizer;
pub use report::Report;
pub use tools::chemspot::{ChemSpot, ChemSpotOptions};
pub use tools::opsin::{NameConversion, Opsin, OpsinFormat, OpsinOptions};
pub use tools::osra::{Osra, OsraFormat, OsraOptions, OsraOutput};
pub use tools::{ExternalTool, ToolError};
