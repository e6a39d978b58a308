pub(crate) mod utils;
pub use utils::*;

pub(crate) mod route_op;
pub use route_op::*;

pub(crate) mod add_op;
pub use add_op::*;

pub(crate) mod get_op;
pub use get_op::*;

pub(crate) mod edit_op;
pub use edit_op::*;

pub(crate) mod del_op;
pub use del_op::*;

pub(crate) mod table_op;
pub use table_op::*;

pub(crate) mod login_op;
pub use login_op::*;
