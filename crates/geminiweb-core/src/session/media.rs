//! Image download through the authenticated session.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::decoder::Image;
use crate::transport::HttpRequest;
use crate::GeminiError;

use super::manager::Session;

impl Session {
    /// Download `image` with the session cookies and write it into `dir`.
    ///
    /// The file name comes from the last URL path segment when it carries
    /// an extension, otherwise from the title plus an extension guessed
    /// from the response content type. Returns the written path.
    pub async fn fetch_image(&self, image: &Image, dir: &Path) -> Result<PathBuf, GeminiError> {
        if !self.is_ready() {
            return Err(GeminiError::NotInitialized);
        }
        if image.url.is_empty() {
            return Err(GeminiError::InvalidArgument("image has no URL".into()));
        }

        let request = HttpRequest::get(&image.url, self.options().timeout)
            .with_cookie_header(self.credentials().cookie_header());
        let response = self.transport().perform(request).await?;
        if response.is_auth_denied() {
            return Err(GeminiError::Auth(format!(
                "image download rejected (HTTP {})",
                response.status
            )));
        }
        if !response.is_success() {
            return Err(GeminiError::Transport(format!(
                "image download failed (HTTP {})",
                response.status
            )));
        }

        let content_type = response.header_values("content-type").next().unwrap_or("");
        let path = dir.join(image_file_name(image, content_type));

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| GeminiError::Cache(format!("{}: {e}", dir.display())))?;
        tokio::fs::write(&path, &response.body)
            .await
            .map_err(|e| GeminiError::Cache(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = response.body.len(), "Image saved");
        Ok(path)
    }
}

fn image_file_name(image: &Image, content_type: &str) -> String {
    let segment = image
        .url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .map(sanitize)
        .unwrap_or_default();
    if segment.contains('.') && !segment.starts_with('.') {
        return segment;
    }

    let stem = sanitize(image.title.trim_matches(|c| c == '[' || c == ']'));
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    format!("{stem}.{}", extension_for(content_type))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
