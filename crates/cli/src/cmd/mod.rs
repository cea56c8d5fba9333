mod create;
mod diff;
mod extract;
mod info;
mod ls;
mod verify;

pub use create::{CreateArgs, cmd_create};
pub use diff::cmd_diff;
pub use extract::cmd_extract;
pub use info::cmd_info;
pub use ls::cmd_ls;
pub use verify::cmd_verify;
