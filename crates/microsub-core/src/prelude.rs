use super::*;

pub use cursor::*;
pub use datetime::*;
pub use feed_kind::*;
pub use fetch::*;
pub use filter::*;
pub use item::*;
pub use mention::*;
pub use parser::*;
pub use sanitize::*;
pub use tier::*;
pub use uid::*;

pub(crate) mod internal {
    

    pub use serde::{Deserialize, Serialize};
}
