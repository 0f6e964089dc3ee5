mod health;
mod url;

pub use health::ping_handler;
pub use url::{
    create_short_url_handler, redirect_handler, shorten_batch_handler, shorten_handler,
    unsupported_handler,
};
