//! Reading extraction and OCR engine clients.

pub mod extraction;
pub mod ocr;
pub mod selector;

pub use extraction::{extract_reading, parse_reading};
pub use ocr::{parse_detection_response, DisabledTextDetector, HttpTextDetector, OcrEndpoint};
pub use selector::{select_from_results, select_reading};
