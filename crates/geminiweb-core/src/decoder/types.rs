//! Typed view of a decoded generation.

use std::fmt;

use serde::Serialize;

use crate::GeminiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Found on the web and linked by the answer.
    Web,
    /// Produced by the model.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub url: String,
    pub title: String,
    pub alt: String,
    pub kind: ImageKind,
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.title.is_empty() {
            "[Image]"
        } else {
            self.title.as_str()
        };
        write!(f, "{title}({})", self.url)?;
        if !self.alt.is_empty() {
            write!(f, " - {}", self.alt)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttachment {
    pub file_name: String,
    pub mime_type: String,
    /// First immersive chip URL in the candidate text. Shared by every
    /// attachment of the candidate; the payload does not say which chip
    /// belongs to which file.
    pub url: Option<String>,
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeExecution {
    pub output: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factuality {
    pub rating: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSource {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// One generated alternative within a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub thoughts: Option<String>,
    pub web_images: Vec<Image>,
    pub generated_images: Vec<Image>,
    pub code_blocks: Vec<CodeBlock>,
    pub file_attachments: Vec<FileAttachment>,
    pub code_execution: Option<CodeExecution>,
    pub factuality: Option<Factuality>,
    pub sources: Vec<WebSource>,
}

impl Candidate {
    /// Web images followed by generated images.
    pub fn images(&self) -> Vec<&Image> {
        self.web_images
            .iter()
            .chain(self.generated_images.iter())
            .collect()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Decoded reply to one turn.
///
/// Always holds at least one candidate. The convenience accessors read
/// through to the chosen candidate (index 0 unless selected otherwise);
/// they are views, not copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    metadata: Vec<Option<String>>,
    candidates: Vec<Candidate>,
    chosen: usize,
}

impl GenerationResult {
    pub(crate) fn new(
        metadata: Vec<Option<String>>,
        candidates: Vec<Candidate>,
    ) -> Result<Self, GeminiError> {
        if candidates.is_empty() {
            return Err(GeminiError::Parse("no candidates".into()));
        }
        Ok(Self {
            metadata,
            candidates,
            chosen: 0,
        })
    }

    /// Opaque continuation metadata returned by the backend
    /// (conversation id, response id, ...).
    pub fn metadata(&self) -> &[Option<String>] {
        &self.metadata
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata.first().and_then(|m| m.as_deref())
    }

    pub fn response_id(&self) -> Option<&str> {
        self.metadata.get(1).and_then(|m| m.as_deref())
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn chosen_index(&self) -> usize {
        self.chosen
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidates[self.chosen]
    }

    /// Same result viewed through another candidate.
    pub fn with_chosen(&self, index: usize) -> Result<Self, GeminiError> {
        if index >= self.candidates.len() {
            return Err(GeminiError::IndexOutOfRange {
                index,
                len: self.candidates.len(),
            });
        }
        Ok(Self {
            chosen: index,
            ..self.clone()
        })
    }

    pub fn rcid(&self) -> &str {
        &self.candidate().id
    }

    pub fn text(&self) -> &str {
        &self.candidate().text
    }

    pub fn thoughts(&self) -> Option<&str> {
        self.candidate().thoughts.as_deref()
    }

    pub fn images(&self) -> Vec<&Image> {
        self.candidate().images()
    }

    pub fn code_blocks(&self) -> &[CodeBlock] {
        &self.candidate().code_blocks
    }

    pub fn file_attachments(&self) -> &[FileAttachment] {
        &self.candidate().file_attachments
    }

    pub fn code_execution(&self) -> Option<&CodeExecution> {
        self.candidate().code_execution.as_ref()
    }

    pub fn factuality(&self) -> Option<&Factuality> {
        self.candidate().factuality.as_ref()
    }

    pub fn sources(&self) -> &[WebSource] {
        &self.candidate().sources
    }
}

impl fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.candidate(), f)
    }
}
