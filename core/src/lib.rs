#[cfg(feature = "io_ext")]
pub mod io_ext;

/// Strips the padding from a fixed-width string field.
/// Everything from the first NUL onward is padding, as is any trailing whitespace before it.
pub fn trim_padding(s: &str) -> &str {
	let end = s.find('\0').unwrap_or(s.len());
	s[..end].trim_end()
}
