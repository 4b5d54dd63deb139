//! Sentence-aware character chunking.
//!
//! Documents are split into sentence-like units on `.`/`!`/`?` followed by whitespace,
//! then greedily packed into chunks of a target character length with a sliding overlap
//! carried between adjacent chunks. Two policies are deliberate:
//!
//! - A sentence is never split, even when a single sentence exceeds the target size;
//!   the oversized sentence becomes its own chunk.
//! - The overlap seed is truncated at a word boundary, so a chunk never begins mid-word.
//!
//! Offsets are byte positions into the original UTF-8 text and always fall on character
//! boundaries; each chunk's content is a literal slice of the input, so concatenating the
//! non-overlap spans reconstructs the document exactly.

use super::types::ChunkingError;

/// One contiguous segment of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// 0-based sequential chunk index.
    pub index: usize,
    /// Offset of the first byte of this chunk's content within the original text.
    pub start: usize,
    /// Offset one past the last byte of this chunk's content.
    pub end: usize,
    /// Chunk text, including the overlap seed carried from the previous chunk.
    pub content: String,
}

impl TextChunk {
    /// Character length of the chunk content.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Split text into overlapping chunks of roughly `chunk_size` characters.
///
/// `overlap` is clamped below `chunk_size`; whitespace-only input yields zero chunks.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut chunk_start = 0usize;
    let mut new_material = false;
    let mut len_chars = 0usize;
    let mut end = 0usize;

    for (sent_start, sent_end) in sentence_spans(text) {
        let sent_chars = text[sent_start..sent_end].chars().count();

        if new_material && len_chars + sent_chars > chunk_size {
            chunks.push(TextChunk {
                index: chunks.len(),
                start: chunk_start,
                end,
                content: text[chunk_start..end].to_string(),
            });
            let (seed_start, seed_chars) = overlap_tail(text, chunk_start, end, overlap);
            chunk_start = seed_start;
            len_chars = seed_chars;
            new_material = false;
        }

        if !new_material && len_chars == 0 {
            chunk_start = sent_start;
        }
        new_material = true;
        len_chars += sent_chars;
        end = sent_end;
    }

    if new_material {
        chunks.push(TextChunk {
            index: chunks.len(),
            start: chunk_start,
            end,
            content: text[chunk_start..end].to_string(),
        });
    }

    Ok(chunks)
}

/// Byte spans of sentence-like units, tiling the input exactly.
///
/// A boundary sits after a run of `.`/`!`/`?` plus the following whitespace run; the
/// whitespace stays attached to the preceding sentence.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut sent_start = 0usize;
    let mut after_terminator = false;
    let mut in_boundary_ws = false;

    for (idx, ch) in text.char_indices() {
        if in_boundary_ws {
            if ch.is_whitespace() {
                continue;
            }
            spans.push((sent_start, idx));
            sent_start = idx;
            in_boundary_ws = false;
            after_terminator = matches!(ch, '.' | '!' | '?');
            continue;
        }
        if matches!(ch, '.' | '!' | '?') {
            after_terminator = true;
        } else if ch.is_whitespace() {
            if after_terminator {
                in_boundary_ws = true;
            }
        } else {
            after_terminator = false;
        }
    }

    if sent_start < text.len() {
        spans.push((sent_start, text.len()));
    }
    spans
}

/// Locate the overlap seed: the last `overlap` characters of the closed chunk,
/// truncated forward to a word boundary. Returns `(byte_start, char_count)`;
/// a window with no usable boundary yields an empty seed.
fn overlap_tail(text: &str, chunk_start: usize, chunk_end: usize, overlap: usize) -> (usize, usize) {
    if overlap == 0 {
        return (chunk_end, 0);
    }
    let content = &text[chunk_start..chunk_end];

    let mut window_start = 0usize;
    let mut counted = 0usize;
    for (idx, _) in content.char_indices().rev() {
        window_start = idx;
        counted += 1;
        if counted == overlap {
            break;
        }
    }
    if counted < overlap {
        window_start = 0;
    }

    let at_boundary = window_start == 0
        || content[window_start..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace())
        || content[..window_start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_whitespace());

    let tail_start = if at_boundary {
        window_start
    } else {
        match content[window_start..].find(|c: char| c.is_whitespace()) {
            Some(offset) => window_start + offset,
            None => return (chunk_end, 0),
        }
    };

    let chars = content[tail_start..].chars().count();
    (chunk_start + tail_start, chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 25 characters including the trailing space.
    const SENTENCE: &str = "abcd efgh ijkl mnop qrs. ";

    fn sample_text(sentences: usize) -> String {
        SENTENCE.repeat(sentences)
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).unwrap().is_empty());
        assert!(chunk_text("   \n\t  ", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = chunk_text("hello", 0, 0).unwrap_err();
        assert!(matches!(err, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn single_short_text_is_one_chunk() {
        let chunks = chunk_text("Just one sentence here.", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].content, "Just one sentence here.");
    }

    #[test]
    fn oversized_sentence_is_emitted_whole() {
        let text = "a".repeat(1500);
        let chunks = chunk_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_len(), 1500);
    }

    #[test]
    fn default_parameters_give_three_chunks_for_2500_chars() {
        let text = sample_text(100);
        assert_eq!(text.chars().count(), 2500);

        let chunks = chunk_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 3);

        // Chunk 2 opens with chunk 1's word-boundary-truncated tail.
        let tail: String = chunks[0]
            .content
            .chars()
            .skip(chunks[0].char_len().saturating_sub(200))
            .collect();
        assert!(tail.chars().count() <= 200);
        assert!(chunks[1].content.starts_with(&tail));
    }

    #[test]
    fn chunk_indices_and_offsets_are_ordered() {
        let text = sample_text(100);
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.start < chunk.end);
            assert!(chunk.end <= text.len());
            assert_eq!(chunk.content, &text[chunk.start..chunk.end]);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].start < pair[1].start);
            // Overlap never reaches past the previous chunk's end.
            assert!(pair[1].start >= pair[0].start);
            assert!(pair[1].start <= pair[0].end);
        }
    }

    #[test]
    fn non_overlap_spans_reconstruct_the_document() {
        let text = sample_text(100);
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        let mut reconstructed = String::new();
        let mut covered = 0usize;
        for chunk in &chunks {
            reconstructed.push_str(&text[covered..chunk.end]);
            covered = chunk.end;
        }
        assert_eq!(reconstructed, text);
    }

    #[test]
    fn overlap_is_bounded_and_respects_word_boundaries() {
        let text = sample_text(100);
        let overlap = 200;
        let chunks = chunk_text(&text, 1000, overlap).unwrap();

        for pair in chunks.windows(2) {
            let overlap_chars = text[pair[1].start..pair[0].end].chars().count();
            assert!(overlap_chars <= overlap);
            // The seed begins at a word boundary: start of text, or preceded by whitespace,
            // or on whitespace itself.
            let head = text[pair[1].start..].chars().next().unwrap();
            let before = text[..pair[1].start].chars().next_back();
            assert!(
                head.is_whitespace() || before.is_none_or(|c| c.is_whitespace()),
                "chunk started mid-word at byte {}",
                pair[1].start
            );
        }
    }

    #[test]
    fn seed_advances_past_a_word_split_by_the_window() {
        // Sentence longer than the target becomes its own chunk; the 10-char window
        // lands inside "cccc", so the seed starts at the following whitespace.
        let text = "aaaa bbbb cccc dddd. eeee ffff.";
        let chunks = chunk_text(text, 20, 10).unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks[1].content.starts_with(" dddd. "));
    }

    #[test]
    fn abbreviation_like_punctuation_without_space_does_not_split() {
        let chunks = chunk_text("Version 3.14 is out. Second sentence.", 1000, 0).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn sentence_spans_tile_the_text() {
        let text = "One. Two! Three? Four";
        let spans = sentence_spans(text);
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0], (0, 5));
        assert_eq!(spans.last().unwrap().1, text.len());
        let mut cursor = 0;
        for (start, end) in spans {
            assert_eq!(start, cursor);
            cursor = end;
        }
    }
}
