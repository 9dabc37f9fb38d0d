//! Core types for a single upload attempt.
//!
//! This module contains the crop categories offered to the user, the
//! selection the host UI builds up before submitting, and the terminal
//! result of an upload.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::sources::ImageSource;

/// Prompt shown by hosts when the user submits without picking an image
pub const MISSING_IMAGE_PROMPT: &str = "Please select an image.";

/// Crop types the classifier understands, in picker order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    #[default]
    Apple,
    Cherry,
    Corn,
    Grape,
}

impl CropType {
    pub const ALL: [CropType; 4] = [
        CropType::Apple,
        CropType::Cherry,
        CropType::Corn,
        CropType::Grape,
    ];

    /// Value sent in the `crop` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Apple => "apple",
            CropType::Cherry => "cherry",
            CropType::Corn => "corn",
            CropType::Grape => "grape",
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CropType::ALL
            .iter()
            .copied()
            .find(|crop| crop.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let valid: Vec<&str> = CropType::ALL.iter().map(|c| c.as_str()).collect();
                format!("Unknown crop '{}', expected one of: {}", wanted, valid.join(", "))
            })
    }
}

/// What the user has chosen so far on the upload screen
#[derive(Clone, Default)]
pub struct SelectionState {
    pub image: Option<Arc<dyn ImageSource>>,
    pub crop: CropType,
}

impl SelectionState {
    /// Empty selection: no image, first crop selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection with both fields filled in
    pub fn with_image(image: Arc<dyn ImageSource>, crop: CropType) -> Self {
        Self {
            image: Some(image),
            crop,
        }
    }

    /// Record the image the picker returned, replacing any earlier pick
    pub fn set_image(&mut self, image: Arc<dyn ImageSource>) {
        self.image = Some(image);
    }

    pub fn set_crop(&mut self, crop: CropType) {
        self.crop = crop;
    }

    /// Whether the selection can be submitted
    pub fn is_ready(&self) -> bool {
        self.image.is_some()
    }
}

impl fmt::Debug for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionState")
            .field("image", &self.image.as_ref().map(|i| i.describe()))
            .field("crop", &self.crop)
            .finish()
    }
}

/// Terminal outcome of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UploadResult {
    /// Server accepted the upload; carries the raw response body
    Success(String),
    /// Server answered with a non-success status; carries the reason phrase
    ServerError(String),
    /// The request never produced a response (or the image could not be staged)
    TransportError(String),
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success(_))
    }

    /// Text for the result area of the screen
    pub fn display_text(&self) -> String {
        match self {
            UploadResult::Success(body) => body.clone(),
            UploadResult::ServerError(reason) => format!("Response error: {}", reason),
            UploadResult::TransportError(message) => format!("Error: {}", message),
        }
    }
}
