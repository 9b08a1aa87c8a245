//! Plain-text corpus export
//!
//! Every document with non-blank extracted text becomes one record:
//!
//! ```text
//! ==DOC_START==
//! <normalized url>
//! ==CONTENT_START==
//! <extracted text, carriage returns removed>
//! ==DOC_END==
//! ```

use crate::storage::{Storage, StorageError};
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the corpus to `path`, returning the number of records written
pub fn export_corpus<S: Storage + ?Sized>(storage: &S, path: &Path) -> Result<u64> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let written = write_corpus(storage, &mut writer)?;
    writer.flush()?;
    Ok(written)
}

/// Writes the corpus to any writer
pub fn write_corpus<S: Storage + ?Sized, W: Write>(storage: &S, out: &mut W) -> Result<u64> {
    let mut written = 0;

    storage.visit_documents(&mut |doc| {
        if doc.extracted_text.trim().is_empty() {
            return Ok(());
        }

        write_record(out, &doc.url_norm, &doc.extracted_text)
            .map_err(|e| StorageError::Database(format!("corpus write failed: {}", e)))?;
        written += 1;
        Ok(())
    })?;

    Ok(written)
}

fn write_record<W: Write>(out: &mut W, url_norm: &str, text: &str) -> std::io::Result<()> {
    writeln!(out, "==DOC_START==")?;
    writeln!(out, "{}", url_norm)?;
    writeln!(out, "==CONTENT_START==")?;
    writeln!(out, "{}", text.replace('\r', ""))?;
    writeln!(out, "==DOC_END==")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentRecord, SqliteStorage};

    fn document(url: &str, text: &str) -> DocumentRecord {
        DocumentRecord {
            url_norm: url.to_string(),
            raw_url: url.to_string(),
            source: "wiki".to_string(),
            fetched_at: 0,
            raw_content: String::new(),
            extracted_text: text.to_string(),
            content_hash: String::new(),
            http_status: 200,
        }
    }

    #[test]
    fn test_write_corpus_format() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_document(&document("https://w/wiki/A", "Line one\r\nLine two"))
            .unwrap();
        storage
            .upsert_document(&document("https://w/wiki/Blank", "  \n "))
            .unwrap();
        storage
            .upsert_document(&document("https://w/wiki/B", "Beta"))
            .unwrap();

        let mut out = Vec::new();
        let written = write_corpus(&storage, &mut out).unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "==DOC_START==\nhttps://w/wiki/A\n==CONTENT_START==\nLine one\nLine two\n==DOC_END==\n\
             ==DOC_START==\nhttps://w/wiki/B\n==CONTENT_START==\nBeta\n==DOC_END==\n"
        );
    }

    #[test]
    fn test_export_corpus_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_document(&document("https://w/wiki/A", "Alpha"))
            .unwrap();

        assert_eq!(export_corpus(&storage, &path).unwrap(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("==DOC_START==\nhttps://w/wiki/A\n"));
    }

    #[test]
    fn test_export_empty_store() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut out = Vec::new();
        assert_eq!(write_corpus(&storage, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
