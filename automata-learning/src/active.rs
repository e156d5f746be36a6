mod lstar;
pub use lstar::*;

mod oracle;
pub use oracle::*;

mod http;
pub use http::*;

mod observationtable;
pub use observationtable::*;
