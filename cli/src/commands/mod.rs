mod dictionary;
mod helpers;
mod log;
mod nutrition;
mod report;

pub(crate) use dictionary::{cmd_dict_check, cmd_dict_list, cmd_dict_set};
pub(crate) use helpers::json_error;
pub(crate) use log::{cmd_log_set, cmd_log_show};
pub(crate) use nutrition::{cmd_nutrition_list, cmd_nutrition_set, cmd_nutrition_show};
pub(crate) use report::cmd_report;
