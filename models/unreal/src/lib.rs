pub mod psk;

use bitflags::bitflags;

#[cfg(feature = "import")]
use std::{
	fs,
	path::Path
};

#[cfg(feature = "import")]
use psk::{
	import::PskImportError,
	PskModel
};

bitflags! {
	pub struct ImportFlag: u32 {
		/// Fail on chunks with an unrecognized tag instead of skipping their payload
		const STRICT_CHUNKS = 1;
		/// Skip EXTRAUVS payloads without storing them
		const SKIP_EXTRA_UVS = 2;
	}
}

impl Default for ImportFlag {
	fn default() -> Self {
		ImportFlag::empty()
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportCfg {
	pub flags: ImportFlag,
}

/// Loads a PSK file from disk
#[cfg(feature = "import")]
pub fn read<P>(filepath: P, cfg: &ImportCfg) -> Result<PskModel, PskImportError>
where
	P: AsRef<Path>,
{
	let filepath = filepath.as_ref();
	let data = fs::read(filepath)?;
	log::debug!("Loading {} ({} bytes)", filepath.display(), data.len());

	PskModel::from_bytes(&data, cfg)
}
