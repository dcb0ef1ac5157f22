mod escape;
mod parser;

pub(crate) use escape::escape_bytes;
pub(crate) use parser::parse_bstr_field;
pub(crate) use parser::parse_str_list;
pub(crate) use parser::parse_string_field;
