//! Text anchoring engine
//!
//! Data flow: selection → [`codec`] (build) → stored annotation → [`resolver`]
//! (on load or URL change) → [`segments`] → [`painter`]. Every stage works
//! over the linearized text from [`linearize`], never over node identity, so
//! an anchor stays resolvable after the page's nodes are replaced.

pub mod codec;
pub mod linearize;
pub mod painter;
pub mod resolver;
pub mod segments;

pub use codec::{build_anchor, build_annotation, is_range_highlightable, linear_offset, Anchor, CONTEXT_CHARS};
pub use linearize::{linearize, ExclusionPolicy, TextRun, TextSnapshot};
pub use painter::{
    annotation_at, clear_focus, focus, paint_annotation, repaint_all, unpaint, unpaint_all,
    update_comment, wrap_segment, wrappers, PaintConfig, PaintPlan, PaintReport, RepaintReport,
    WrapError,
};
pub use resolver::{find_text_match, normalize_whitespace, resolve, ResolveMethod, ResolvedSpan};
pub use segments::{segments_for_range, segments_for_span, Segment};
