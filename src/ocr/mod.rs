//! Tesseract OCR plumbing and scoreboard text parsing.

pub mod engine;
pub mod parse;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrOptions, Tesseract, TextRecognizer};
