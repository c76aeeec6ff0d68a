//! Infrastructure Layer
//!
//! Concrete collaborators: the render worker thread, the wkhtmltopdf
//! engine, file templates, the IQSMS client and the incremental stamper.

pub mod iqsms;
pub mod render_worker;
pub mod stamper;
pub mod template;
pub mod wkhtmltopdf;
