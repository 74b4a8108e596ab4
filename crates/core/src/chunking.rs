use crate::error::IngestError;
use crate::models::{LoaderOptions, PdfChunk};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Sizes are measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&LoaderOptions> for ChunkingConfig {
    fn from(value: &LoaderOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits on the coarsest separator present, recursing into pieces that are
/// still too large, then merges small pieces back up to `chunk_size` while
/// carrying `chunk_overlap` characters into the next chunk.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let remaining = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    };

    let mut chunks = Vec::new();
    let mut pending = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_splits(&pending, separator, config));
            pending.clear();
        }

        if remaining.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_recursive(&piece, remaining, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_splits(&pending, separator, config));
    }

    chunks
}

fn merge_splits(splits: &[String], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for split in splits {
        let len = char_len(split);
        let joiner = if current.is_empty() { 0 } else { separator_len };

        if total + len + joiner > config.chunk_size && !current.is_empty() {
            push_joined(&mut merged, &current, separator);

            loop {
                let joiner = if current.is_empty() { 0 } else { separator_len };
                let above_overlap = total > config.chunk_overlap;
                let still_too_long = total > 0 && total + len + joiner > config.chunk_size;
                if !above_overlap && !still_too_long {
                    break;
                }

                let Some(front) = current.pop_front() else {
                    break;
                };
                let dropped_joiner = if current.is_empty() { 0 } else { separator_len };
                total = total.saturating_sub(char_len(front) + dropped_joiner);
            }
        }

        let added_joiner = if current.is_empty() { 0 } else { separator_len };
        current.push_back(split.as_str());
        total += len + added_joiner;
    }

    push_joined(&mut merged, &current, separator);
    merged
}

fn push_joined(target: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits one page into chunks and returns them with the next free chunk index.
pub fn build_chunks(
    source_path: &str,
    page: u32,
    page_text: &str,
    config: ChunkingConfig,
    first_index: u64,
) -> (Vec<PdfChunk>, u64) {
    let mut chunks = Vec::new();
    let mut cursor = first_index;
    let mut previous: Option<(usize, usize)> = None;

    for text in split_text(page_text, config) {
        let offset = match previous {
            Some((start, end)) => {
                let after_start = next_char_boundary(page_text, start);
                back_by_chars(page_text, end, config.chunk_overlap).max(after_start)
            }
            None => 0,
        };
        let start_index = page_text[offset..]
            .find(&text)
            .map(|found| offset + found)
            .unwrap_or(offset);

        previous = Some((start_index, (start_index + text.len()).min(page_text.len())));

        chunks.push(PdfChunk {
            chunk_id: make_chunk_id(source_path, page, cursor, &text),
            source_path: source_path.to_string(),
            page,
            start_index,
            chunk_index: cursor,
            text,
        });

        cursor = cursor.saturating_add(1);
    }

    (chunks, cursor)
}

/// Byte offset `chars` characters before `end`, clamped to the start of `text`.
fn back_by_chars(text: &str, end: usize, chars: usize) -> usize {
    let end = floor_char_boundary(text, end);
    if chars == 0 {
        return end;
    }
    text[..end]
        .char_indices()
        .rev()
        .take(chars)
        .last()
        .map(|(index, _)| index)
        .unwrap_or(end)
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    let index = floor_char_boundary(text, index);
    text[index..]
        .chars()
        .next()
        .map(|ch| index + ch.len_utf8())
        .unwrap_or(index)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn make_chunk_id(source_path: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 6,
        }
    }

    #[test]
    fn short_paragraphs_merge_into_one_chunk() {
        let config = ChunkingConfig::from(&LoaderOptions::default());
        let chunks = split_text("First paragraph.\n\nSecond paragraph.", config);
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph.".to_string()]);
    }

    #[test]
    fn long_text_respects_size_and_carries_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = split_text(text, small());

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert_eq!(chunks[0], "alpha beta gamma");
        assert!(chunks[1].starts_with("gamma"));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(45);
        let chunks = split_text(&text, small());
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn start_index_points_at_chunk_text() {
        let page = "alpha beta gamma delta epsilon zeta eta theta\n\niota kappa lambda";
        let (chunks, next) = build_chunks("/tmp/doc.pdf", 2, page, small(), 7);

        assert_eq!(next, 7 + chunks.len() as u64);
        for chunk in &chunks {
            assert_eq!(chunk.page, 2);
            let end = chunk.start_index + chunk.text.len();
            assert_eq!(&page[chunk.start_index..end], chunk.text);
        }
        assert!(chunks.windows(2).all(|pair| pair[0].start_index < pair[1].start_index));
    }

    #[test]
    fn start_index_counts_overlap_in_characters_for_multibyte_text() {
        let page = vec!["ééé"; 12].join(" ");
        let config = ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 10,
        };
        let (chunks, _) = build_chunks("/tmp/doc.pdf", 1, &page, config, 0);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            let end = chunk.start_index + chunk.text.len();
            assert_eq!(&page[chunk.start_index..end], chunk.text);
        }
        let starts: Vec<usize> = chunks.iter().map(|chunk| chunk.start_index).collect();
        assert!(starts.windows(2).all(|pair| pair[0] < pair[1]), "{starts:?}");
        assert_eq!(starts[1], "ééé ééé ééé ".len());
    }

    #[test]
    fn chunk_ids_are_deterministic_and_distinct() {
        let page = "alpha beta gamma delta epsilon zeta eta theta";
        let (first, _) = build_chunks("/tmp/doc.pdf", 1, page, small(), 0);
        let (second, _) = build_chunks("/tmp/doc.pdf", 1, page, small(), 0);
        assert_eq!(first, second);
        assert_ne!(first[0].chunk_id, first[1].chunk_id);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(matches!(
            config.validate(),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }
}
