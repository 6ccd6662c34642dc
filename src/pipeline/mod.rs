//! Pipeline stages for lab-report analysis.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ request ──▶ transport ──▶ normalize ──▶ (recover)
//! (path/URL) (base64)  (prompt +    (one POST,    (defaults)    (fallback)
//!                       schema)      timeout)
//! ```
//!
//! 1. [`input`]     : read or download the file and gate on `application/pdf`
//! 2. [`encode`]    : base64-wrap the PDF as an inline data part
//! 3. [`request`]   : assemble prompt, document, and response schema
//! 4. [`transport`] : the only stage with network I/O; bounded by a timeout
//! 5. [`normalize`] : parse, validate, and default the model's JSON
//! 6. [`recover`]   : build a fallback result when step 5 cannot parse

pub mod encode;
pub mod input;
pub mod normalize;
pub mod recover;
pub mod request;
pub mod transport;
