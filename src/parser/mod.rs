//! Article parsing: section segmentation and citation-marker grammar.

mod citations;
mod segmenter;

pub use citations::{
    citation_set, extract_citations, find_markers, remove_numbers, render_group,
    rewrite_markers, strip_markers, CitationExtractor, CitationMarker,
};
pub use segmenter::{segment, SectionSegmenter, SegmentOptions};
