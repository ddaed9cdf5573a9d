//! File extension → MIME type table for decoded attachments.

const DEFAULT_MIME: &str = "text/plain";

const MIME_TYPES: &[(&str, &str)] = &[
    ("c", "text/x-c"),
    ("cpp", "text/x-c++"),
    ("cs", "text/x-csharp"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("go", "text/x-go"),
    ("h", "text/x-c"),
    ("html", "text/html"),
    ("java", "text/x-java"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("kt", "text/x-kotlin"),
    ("md", "text/markdown"),
    ("php", "application/x-httpd-php"),
    ("py", "text/x-python"),
    ("rb", "text/x-ruby"),
    ("rs", "text/x-rust"),
    ("sh", "application/x-sh"),
    ("sql", "application/sql"),
    ("svg", "image/svg+xml"),
    ("swift", "text/x-swift"),
    ("toml", "application/toml"),
    ("ts", "application/typescript"),
    ("tsx", "text/tsx"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
];

pub fn mime_for_file_name(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME)
}
