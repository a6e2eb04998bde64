//! Fixed-size text splitting with exact overlap

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Splits documents into overlapping windows of grapheme clusters
///
/// Window `i` of a document starts at `i * (chunk_size - chunk_overlap)`, so two
/// consecutive chunks of the same document share exactly `chunk_overlap`
/// graphemes. The last window is shortened to end at the document end.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    /// Maximum chunk length in graphemes
    chunk_size: usize,
    /// Graphemes shared by consecutive chunks
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter, rejecting `chunk_overlap >= chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be at least 1"));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split all documents, preserving document order
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for doc in documents {
            let next_sequence = chunks.len() as u64;
            chunks.extend(self.split_document(doc, next_sequence));
        }

        tracing::info!(
            "Split {} document(s) into {} chunk(s) (size {}, overlap {})",
            documents.len(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    /// Split one document; sequence numbers start at `first_sequence`
    pub fn split_document(&self, doc: &Document, first_sequence: u64) -> Vec<Chunk> {
        if doc.content.trim().is_empty() {
            return Vec::new();
        }

        let graphemes: Vec<&str> = doc.content.graphemes(true).collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(graphemes.len());
            let index = chunks.len();

            chunks.push(Chunk::new(
                doc.source.clone(),
                graphemes[start..end].concat(),
                index as u32,
                start,
                end,
                first_sequence + index as u64,
            ));

            if end == graphemes.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentSource;

    fn doc(content: &str, path: &str) -> Document {
        Document::new(content, DocumentSource::file(path))
    }

    #[test]
    fn test_short_documents_yield_one_chunk_each() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        let docs = vec![doc("one", "a"), doc("two", "b"), doc("three", "c")];

        let chunks = splitter.split_documents(&docs);

        assert_eq!(chunks.len(), docs.len());
        assert_eq!(chunks[2].content, "three");
        assert_eq!(chunks[2].sequence, 2);
    }

    #[test]
    fn test_document_of_exact_size_is_one_chunk() {
        let splitter = TextSplitter::new(5, 2).unwrap();
        let chunks = splitter.split_document(&doc("abcde", "a"), 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "abcde");
    }

    #[test]
    fn test_consecutive_chunks_share_exact_overlap() {
        let overlap = 4;
        let splitter = TextSplitter::new(10, overlap).unwrap();
        let text: String = ('a'..='z').cycle().take(57).collect();

        let chunks = splitter.split_document(&doc(&text, "long"), 0);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].content.graphemes(true).collect();
            let next: Vec<&str> = pair[1].content.graphemes(true).collect();
            assert!(prev.len() <= 10);
            assert_eq!(prev[prev.len() - overlap..], next[..overlap]);
            assert_eq!(pair[1].char_start, pair[0].char_end - overlap);
        }
        assert_eq!(chunks.last().unwrap().char_end, 57);
    }

    #[test]
    fn test_chunks_reassemble_document() {
        let splitter = TextSplitter::new(7, 3).unwrap();
        let text = "Spirited Away is a 2001 film.";
        let chunks = splitter.split_document(&doc(text, "ghibli"), 0);

        let mut rebuilt = chunks[0].content.clone();
        for chunk in &chunks[1..] {
            let tail: String = chunk.content.graphemes(true).skip(3).collect();
            rebuilt.push_str(&tail);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_text_is_split_on_graphemes() {
        let splitter = TextSplitter::new(3, 1).unwrap();
        let chunks = splitter.split_document(&doc("進撃の巨人", "jp"), 0);

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["進撃の", "の巨人"]);
    }

    #[test]
    fn test_blank_documents_are_skipped() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert!(splitter.split_document(&doc("  \n ", "blank"), 0).is_empty());
    }

    #[test]
    fn test_invalid_overlap_is_rejected() {
        assert!(matches!(TextSplitter::new(10, 10), Err(Error::Config(_))));
        assert!(matches!(TextSplitter::new(10, 11), Err(Error::Config(_))));
        assert!(matches!(TextSplitter::new(0, 0), Err(Error::Config(_))));
    }
}
