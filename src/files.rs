//! Attaching files to a conversation as `file`-role messages.

use std::path::Path;

use crate::client::ClientError;
use crate::model::ChatMessage;

/// Default upper bound on a file's content, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Longest file name sent to the server; longer names are cut.
pub const MAX_FILE_NAME_CHARS: usize = 50;

/// A file name and its text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub file_name: String,
    pub content: String,
}

impl FileAttachment {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Raw bytes, decoded as UTF-8 with invalid sequences replaced.
    pub fn from_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(file_name, String::from_utf8_lossy(bytes))
    }

    /// Read a file from disk, named after its final path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(file_name, &bytes))
    }

    /// Lowercased text after the final `.`, if the name has one.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// Validation applied by [`create_file_messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Largest accepted content length, in bytes
    pub max_file_size: usize,
    /// Accepted extensions; any extension when `None`
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: None,
        }
    }
}

impl FileOptions {
    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    fn allows(&self, extension: Option<&str>) -> bool {
        let Some(allowed) = &self.allowed_extensions else {
            return true;
        };
        let Some(extension) = extension else {
            return false;
        };
        allowed
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Turn each file into a `file`-role message, keeping input order.
///
/// Fails on the first file that is too large or has an extension outside
/// the allowed set. Names longer than [`MAX_FILE_NAME_CHARS`] are truncated.
pub fn create_file_messages(
    files: &[FileAttachment],
    options: &FileOptions,
) -> Result<Vec<ChatMessage>, ClientError> {
    files
        .iter()
        .map(|file| {
            if file.content.len() > options.max_file_size {
                return Err(ClientError::FileTooLarge {
                    file_name: file.file_name.clone(),
                    max_size: options.max_file_size,
                });
            }

            if !options.allows(file.extension().as_deref()) {
                return Err(ClientError::UnsupportedExtension {
                    file_name: file.file_name.clone(),
                    allowed: options.allowed_extensions.clone().unwrap_or_default(),
                });
            }

            Ok(ChatMessage::file(
                truncate_file_name(&file.file_name),
                file.content.clone(),
            ))
        })
        .collect()
}

/// Prepend one message per file to `messages`.
pub fn prepend_file_messages(
    messages: Vec<ChatMessage>,
    files: &[FileAttachment],
    options: &FileOptions,
) -> Result<Vec<ChatMessage>, ClientError> {
    let mut combined = create_file_messages(files, options)?;
    combined.extend(messages);
    Ok(combined)
}

fn truncate_file_name(name: &str) -> String {
    name.chars().take(MAX_FILE_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn test_messages_in_input_order() {
        let files = vec![
            FileAttachment::new("a.txt", "first"),
            FileAttachment::new("b.md", "second"),
        ];
        let messages = create_file_messages(&files, &FileOptions::default()).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.role == Role::File));
        assert_eq!(messages[0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(messages[1].content.as_deref(), Some("second"));
    }

    #[test]
    fn test_long_name_truncated_to_50_chars() {
        let name = format!("{}.txt", "n".repeat(56));
        assert_eq!(name.chars().count(), 60);
        let messages =
            create_file_messages(&[FileAttachment::new(name.clone(), "x")], &FileOptions::default()).unwrap();
        let truncated = messages[0].file_name.clone().unwrap();
        assert_eq!(truncated.chars().count(), 50);
        assert_eq!(truncated, name.chars().take(50).collect::<String>());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let name = "é".repeat(60);
        assert_eq!(truncate_file_name(&name), "é".repeat(50));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let options = FileOptions::default().with_max_file_size(4);
        let err = create_file_messages(&[FileAttachment::new("big.txt", "12345")], &options).unwrap_err();
        assert!(matches!(&err, ClientError::FileTooLarge { file_name, max_size: 4 } if file_name == "big.txt"));
        let message = err.to_string();
        assert!(message.contains("big.txt"));
        assert!(message.contains('4'));
    }

    #[test]
    fn test_disallowed_extension_lists_allowed() {
        let options = FileOptions::default().with_allowed_extensions(["txt", "md"]);
        let err = create_file_messages(&[FileAttachment::new("run.exe", "x")], &options).unwrap_err();
        assert!(err.to_string().contains("txt, md"));
        assert!(err.to_string().contains("run.exe"));
    }

    #[test]
    fn test_extension_case_insensitive() {
        let options = FileOptions::default().with_allowed_extensions([".TXT"]);
        assert!(create_file_messages(&[FileAttachment::new("Notes.Txt", "x")], &options).is_ok());
        assert!(create_file_messages(&[FileAttachment::new("README", "x")], &options).is_err());
    }

    #[test]
    fn test_prepend_keeps_caller_messages_last() {
        let messages = prepend_file_messages(
            vec![ChatMessage::user("summarize")],
            &[FileAttachment::new("a.txt", "data")],
            &FileOptions::default(),
        )
        .unwrap();
        assert_eq!(messages[0].role, Role::File);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_from_bytes_lossy() {
        let file = FileAttachment::from_bytes("x.bin", &[0x68, 0x69, 0xFF]);
        assert_eq!(file.content, "hi\u{FFFD}");
    }

    #[tokio::test]
    async fn test_from_path_reads_content() {
        let path = std::env::temp_dir().join(format!("oai-compat-{}.txt", std::process::id()));
        tokio::fs::write(&path, "from disk").await.unwrap();
        let file = FileAttachment::from_path(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(file.content, "from disk");
        assert!(file.file_name.starts_with("oai-compat-"));
        assert_eq!(file.extension().as_deref(), Some("txt"));
    }
}
