use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	Cursor,
	Error,
	ErrorKind,
	Read,
	Result
};

use ultraviolet::vec::{
	Vec2,
	Vec3,
	Vec4
};

pub trait ReadBinExt: Read {
	/// Reads exactly `length` bytes as single-byte characters.
	/// Padding is kept as-is; use [`crate::trim_padding`] to strip it.
	#[inline]
	fn read_fixed_str(&mut self, length: usize) -> Result<String> {
		let mut raw = vec![0; length];
		self.read_exact(&mut raw)?;

		Ok(raw.iter().map(|&b| b as char).collect())
	}

	/// Reads a little endian 2D vector
	#[inline]
	fn read_vec2_le(&mut self) -> Result<Vec2> {
		let x = self.read_f32::<LE>()?;
		let y = self.read_f32::<LE>()?;

		Ok(Vec2::new(x, y))
	}

	/// Reads a little endian 3D vector
	#[inline]
	fn read_vec3_le(&mut self) -> Result<Vec3> {
		let x = self.read_f32::<LE>()?;
		let y = self.read_f32::<LE>()?;
		let z = self.read_f32::<LE>()?;

		Ok(Vec3::new(x, y, z))
	}

	/// Reads a little endian 4D vector
	#[inline]
	fn read_vec4_le(&mut self) -> Result<Vec4> {
		let x = self.read_f32::<LE>()?;
		let y = self.read_f32::<LE>()?;
		let z = self.read_f32::<LE>()?;
		let w = self.read_f32::<LE>()?;

		Ok(Vec4::new(x, y, z, w))
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

/// Position bookkeeping for in-memory buffers
pub trait CursorExt {
	/// Number of unread bytes
	fn remaining(&self) -> usize;

	/// True while unread bytes exist
	#[inline]
	fn has_remaining(&self) -> bool {
		self.remaining() > 0
	}

	/// Advances past `count` bytes without decoding them.
	/// Fails with [`ErrorKind::UnexpectedEof`] and leaves the position untouched if fewer remain.
	fn skip(&mut self, count: u64) -> Result<()>;
}

impl<T> CursorExt for Cursor<T>
where
	T: AsRef<[u8]>,
{
	fn remaining(&self) -> usize {
		let len = self.get_ref().as_ref().len() as u64;
		len.saturating_sub(self.position()) as usize
	}

	fn skip(&mut self, count: u64) -> Result<()> {
		if count > self.remaining() as u64 {
			return Err(Error::new(ErrorKind::UnexpectedEof,
				format!("cannot skip {} bytes, {} remain", count, self.remaining())));
		}

		self.set_position(self.position() + count);
		Ok(())
	}
}
