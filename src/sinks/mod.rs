mod epub;
pub use epub::EPUB;

mod html;
pub use html::HTML;

mod pdf;
pub use pdf::PDF;
