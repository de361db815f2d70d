pub mod charset;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod fetch;
pub mod filename;
pub mod pipeline;
pub mod progressive;
pub mod store;
pub mod table;

// Re-export main types for convenient access
pub use charset::{CharsetDetector, DetectedEncoding, EncodingDetectionResult};
pub use config::Config;
pub use dictionary::{DictPair, DictValidationError, DictionaryOverlay};
pub use error::ConvertError;

// Re-export pipeline surface used by the CLI and embedding hosts
pub use pipeline::{
    ConversionEvent, ConversionPipeline, ConversionProgress, ConversionRequest,
    ConversionResult, EventStream, Source, Stage,
};
pub use progressive::{LineProgress, ProgressiveConverter};
pub use store::{DictionaryCache, DictionaryStore, DirectoryStore, LicenseTier, UserContext};
pub use table::{BaseConvert, ScriptConverter};
