//! Document chunking (spec §4.B): splits normalised Markdown into
//! retrieval-sized chunks.
//!
//! Grounded in the teacher's `workspace::chunker` (referenced from
//! `workspace::mod::reindex_document` as `chunk_document(&content,
//! ChunkConfig::default())`, body not retrieved). No tokenizer crate
//! rides along with the teacher's stack, so the budget here is a
//! character heuristic (~4 chars/token for English prose) rather than
//! an exact token count — see the open question recorded in DESIGN.md.

const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_tokens: 400,
            overlap_tokens: 40,
        }
    }
}

impl ChunkConfig {
    fn target_chars(&self) -> usize {
        self.target_tokens * CHARS_PER_TOKEN
    }

    fn overlap_chars(&self) -> usize {
        self.overlap_tokens * CHARS_PER_TOKEN
    }
}

/// Split `content` into chunks at paragraph boundaries, packing
/// consecutive paragraphs up to `target_tokens` and carrying the last
/// `overlap_tokens` worth of text into the next chunk so passages that
/// straddle a boundary still retrieve with surrounding context.
pub fn chunk_document(content: &str, config: ChunkConfig) -> Vec<String> {
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return vec![];
    }

    let target_chars = config.target_chars();
    let overlap_chars = config.overlap_chars();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > target_chars {
            chunks.push(current.clone());
            current = tail(&current, overlap_chars);
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }

        if paragraph.len() > target_chars {
            // A single paragraph larger than the budget: flush what we
            // have and hard-split the paragraph itself.
            if !current.trim().is_empty() {
                chunks.push(current.clone());
                current.clear();
            }
            for piece in hard_split(paragraph, target_chars) {
                chunks.push(piece);
            }
            continue;
        }

        current.push_str(paragraph);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Last `max_chars` of `s`, snapped to a char boundary.
fn tail(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }
    let start = s.len() - max_chars;
    let snapped = (start..s.len())
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(s.len());
    s[snapped..].to_string()
}

fn hard_split(s: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < s.len() {
        let mut end = (start + max_chars).min(s.len());
        while end < s.len() && !s.is_char_boundary(end) {
            end += 1;
        }
        out.push(s[start..end].to_string());
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_short_paragraphs_together() {
        let content = "one.\n\ntwo.\n\nthree.";
        let chunks = chunk_document(content, ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("one.") && chunks[0].contains("three."));
    }

    #[test]
    fn splits_when_budget_exceeded() {
        let paragraph = "word ".repeat(200);
        let content = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        let config = ChunkConfig {
            target_tokens: 100,
            overlap_tokens: 10,
        };
        let chunks = chunk_document(&content, config);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(chunk_document("", ChunkConfig::default()).is_empty());
    }

    #[test]
    fn overlap_carries_tail_into_next_chunk() {
        let paragraph_a = "alpha ".repeat(80);
        let paragraph_b = "beta ".repeat(80);
        let content = format!("{paragraph_a}\n\n{paragraph_b}");
        let config = ChunkConfig {
            target_tokens: 60,
            overlap_tokens: 20,
        };
        let chunks = chunk_document(&content, config);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].starts_with("alpha") || chunks[1].contains("alpha"));
    }
}
