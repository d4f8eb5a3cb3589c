use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	self,
	Cursor,
	Read
};

use ultraviolet::vec::{
	Vec2,
	Vec3,
	Vec4
};

use rgk_core::{
	io_ext::{
		CursorExt,
		ReadBinExt
	},
	trim_padding
};

#[cfg(feature = "import")]
use crate::{
	ImportCfg,
	ImportFlag
};

#[cfg(feature = "import")]
use import::{
	PskImportError,
	read_header,
	records,
	skip_payload
};

/// Tag of the chunk every PSK file opens with
pub const MAGIC: &str = "ACTRHEAD";

pub const CHUNK_HEADER_SIZE: usize = 32;
pub const CHUNK_ID_SIZE: usize = 20;
pub const NAME_SIZE: usize = 64;

pub const POINT_SIZE: usize = 12;
pub const WEDGE_SIZE: usize = 16;
pub const TRIANGLE_SIZE: usize = 12;
pub const MATERIAL_SIZE: usize = 88;
pub const BONE_SIZE: usize = 120;
pub const RAW_WEIGHT_SIZE: usize = 12;
pub const EXTRA_UV_SIZE: usize = 8;
pub const NORMAL_SIZE: usize = 12;

/// Extra UV chunk tags start with this and end in the channel number
pub const EXTRA_UVS_PREFIX: &str = "EXTRAUVS";

/// Wedge chunks up to this many records store 16-bit point indices
pub const MAX_NARROW_WEDGES: i32 = 65536;

bitflags! {
	/// Unreal polygon flags carried by materials. Only the bits ActorX emits are named.
	pub struct PolyFlags: u32 {
		const INVISIBLE = 0x1;
		const MASKED = 0x2;
		const TRANSLUCENT = 0x4;
		const ENVIRONMENT = 0x10;
		const MODULATED = 0x40;
		const TWO_SIDED = 0x100;
		const NO_SMOOTH = 0x800;
		const FLAT = 0x4000;
		const UNLIT = 0x400000;
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
	ActorHead,
	Points,
	Wedges,
	Faces,
	Faces32,
	Materials,
	RefSkeleton,
	RawWeights,
	ExtraUvs,
	VertexNormals,
	Unknown,
}

impl ChunkKind {
	/// Classifies a trimmed chunk tag. Matching is case-sensitive.
	pub fn from_tag(tag: &str) -> ChunkKind {
		match tag {
			MAGIC => ChunkKind::ActorHead,
			"PNTS0000" => ChunkKind::Points,
			"VTXW0000" => ChunkKind::Wedges,
			"FACE0000" => ChunkKind::Faces,
			"FACE3200" => ChunkKind::Faces32,
			"MATT0000" => ChunkKind::Materials,
			"REFSKELT" => ChunkKind::RefSkeleton,
			"RAWWEIGHTS" => ChunkKind::RawWeights,
			"VTXNORMS" => ChunkKind::VertexNormals,
			// Numbered per UV channel: EXTRAUVS0, EXTRAUVS1, ...
			_ if tag.starts_with(EXTRA_UVS_PREFIX) => ChunkKind::ExtraUvs,
			_ => ChunkKind::Unknown,
		}
	}
}

/// The 32-byte header in front of every chunk
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkHeader {
	/// Raw 20-character id, padding included
	pub id: String,
	pub type_flag: i32,
	pub data_size: i32,
	pub data_count: i32,
}

impl ChunkHeader {
	/// Reads one header. No field is validated.
	pub fn read<R>(buf: &mut R) -> io::Result<ChunkHeader>
	where
		R: Read + ?Sized,
	{
		Ok(ChunkHeader {
			id: buf.read_fixed_str(CHUNK_ID_SIZE)?,
			type_flag: buf.read_i32::<LE>()?,
			data_size: buf.read_i32::<LE>()?,
			data_count: buf.read_i32::<LE>()?,
		})
	}

	/// The id without its padding
	pub fn tag(&self) -> &str {
		trim_padding(&self.id)
	}

	pub fn kind(&self) -> ChunkKind {
		ChunkKind::from_tag(self.tag())
	}

	/// Number of records following the header. Negative counts mean none.
	pub fn record_count(&self) -> usize {
		self.data_count.max(0) as usize
	}

	/// Declared payload length in bytes
	pub fn payload_len(&self) -> u64 {
		self.data_size.max(0) as u64 * self.record_count() as u64
	}
}

/// Width of the point index inside a wedge record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexWidth {
	/// u16 index followed by two bytes of padding
	Narrow,
	/// u32 index
	Wide,
}

impl IndexWidth {
	/// Picks the layout for a wedge chunk from its record count
	pub fn for_count(data_count: i32) -> IndexWidth {
		if data_count <= MAX_NARROW_WEDGES {
			IndexWidth::Narrow
		} else {
			IndexWidth::Wide
		}
	}
}

/// A vertex position as stored in the points chunk
pub type Point = Vec3;

/// A textured reference to a point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wedge {
	pub point_index: u32,
	pub uv: Vec2,
	pub material_index: u8,
	pub reserved: u8,
	pub pad: i16,
}

impl Wedge {
	pub fn read<R>(width: IndexWidth, buf: &mut R) -> io::Result<Wedge>
	where
		R: Read + ?Sized,
	{
		let point_index = match width {
			IndexWidth::Narrow => {
				let index = buf.read_u16::<LE>()? as u32;
				let _padding = buf.read_u16::<LE>()?;
				index
			},
			IndexWidth::Wide => buf.read_u32::<LE>()?,
		};

		Ok(Wedge {
			point_index: point_index,
			uv: buf.read_vec2_le()?,
			material_index: buf.read_u8()?,
			reserved: buf.read_u8()?,
			pad: buf.read_i16::<LE>()?,
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
	/// Wedge indices, always 16-bit in this chunk
	pub wedges: [u16; 3],
	pub material_index: u8,
	pub aux_material_index: u8,
	pub smoothing_groups: u32,
}

impl Triangle {
	pub fn read<R>(buf: &mut R) -> io::Result<Triangle>
	where
		R: Read + ?Sized,
	{
		Ok(Triangle {
			wedges: [buf.read_u16::<LE>()?, buf.read_u16::<LE>()?, buf.read_u16::<LE>()?],
			material_index: buf.read_u8()?,
			aux_material_index: buf.read_u8()?,
			smoothing_groups: buf.read_u32::<LE>()?,
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
	/// Raw 64-character name, padding included
	pub name: String,
	pub texture_index: i32,
	pub poly_flags: i32,
	pub aux_material: i32,
	pub aux_flags: i32,
	pub lod_bias: i32,
	pub lod_style: i32,
}

impl Material {
	pub fn read<R>(buf: &mut R) -> io::Result<Material>
	where
		R: Read + ?Sized,
	{
		Ok(Material {
			name: buf.read_fixed_str(NAME_SIZE)?,
			texture_index: buf.read_i32::<LE>()?,
			poly_flags: buf.read_i32::<LE>()?,
			aux_material: buf.read_i32::<LE>()?,
			aux_flags: buf.read_i32::<LE>()?,
			lod_bias: buf.read_i32::<LE>()?,
			lod_style: buf.read_i32::<LE>()?,
		})
	}

	/// The name up to its first NUL, without trailing whitespace.
	/// Leftover bytes after the NUL are dropped; the raw field keeps them.
	pub fn name(&self) -> &str {
		trim_padding(&self.name)
	}

	/// The named polygon flags; unnamed bits are dropped
	pub fn flags(&self) -> PolyFlags {
		PolyFlags::from_bits_truncate(self.poly_flags as u32)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
	/// Raw 64-character name, padding included
	pub name: String,
	pub flags: i32,
	pub num_children: i32,
	pub parent_index: i32,
	/// Quaternion as (x, y, z, w)
	pub orientation: Vec4,
	pub position: Vec3,
	pub length: f32,
	pub size: Vec3,
}

impl Bone {
	pub fn read<R>(buf: &mut R) -> io::Result<Bone>
	where
		R: Read + ?Sized,
	{
		Ok(Bone {
			name: buf.read_fixed_str(NAME_SIZE)?,
			flags: buf.read_i32::<LE>()?,
			num_children: buf.read_i32::<LE>()?,
			parent_index: buf.read_i32::<LE>()?,
			orientation: buf.read_vec4_le()?,
			position: buf.read_vec3_le()?,
			length: buf.read_f32::<LE>()?,
			size: buf.read_vec3_le()?,
		})
	}

	/// The name up to its first NUL, without trailing whitespace.
	/// Leftover bytes after the NUL are dropped; the raw field keeps them.
	pub fn name(&self) -> &str {
		trim_padding(&self.name)
	}
}

/// Influence of one bone over one point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawWeight {
	pub weight: f32,
	pub point_index: i32,
	pub bone_index: i32,
}

impl RawWeight {
	pub fn read<R>(buf: &mut R) -> io::Result<RawWeight>
	where
		R: Read + ?Sized,
	{
		Ok(RawWeight {
			weight: buf.read_f32::<LE>()?,
			point_index: buf.read_i32::<LE>()?,
			bone_index: buf.read_i32::<LE>()?,
		})
	}
}

/// A decoded PSK file. Cross references between collections are left unchecked.
#[derive(Clone, Debug, PartialEq)]
pub struct PskModel {
	header: ChunkHeader,
	points: Vec<Point>,
	wedges: Vec<Wedge>,
	triangles: Vec<Triangle>,
	materials: Vec<Material>,
	bones: Vec<Bone>,
	weights: Vec<RawWeight>,
	extra_uvs: Vec<Vec<Vec2>>,
	normals: Vec<Vec3>,
}

impl PskModel {
	fn new(header: ChunkHeader) -> PskModel {
		PskModel {
			header: header,
			points: vec![],
			wedges: vec![],
			triangles: vec![],
			materials: vec![],
			bones: vec![],
			weights: vec![],
			extra_uvs: vec![],
			normals: vec![],
		}
	}

	/// Decodes a whole PSK buffer, starting at the cursor's position and running until it is exhausted
	#[cfg(feature = "import")]
	pub fn read<T>(buf: &mut Cursor<T>, cfg: &ImportCfg) -> Result<PskModel, PskImportError>
	where
		T: AsRef<[u8]>,
	{
		let header = read_header(buf)?;
		if header.kind() != ChunkKind::ActorHead {
			return Err(PskImportError::Magic(header.tag().to_string()));
		}
		log::trace!("{} type flag {}", MAGIC, header.type_flag);

		let mut model = PskModel::new(header);

		while buf.has_remaining() {
			let chunk = read_header(buf)?;
			log::debug!("{} at {:#x}: {} records of {} bytes", chunk.tag(), buf.position(),
				chunk.data_count, chunk.data_size);

			match chunk.kind() {
				ChunkKind::Points => {
					model.points.extend(records(buf, &chunk, POINT_SIZE, |b| b.read_vec3_le())?);
				},
				ChunkKind::Wedges => {
					let width = IndexWidth::for_count(chunk.data_count);
					model.wedges.extend(records(buf, &chunk, WEDGE_SIZE, |b| Wedge::read(width, b))?);
				},
				ChunkKind::Faces => {
					model.triangles.extend(records(buf, &chunk, TRIANGLE_SIZE, Triangle::read)?);
				},
				ChunkKind::Faces32 => {
					if chunk.record_count() > 0 {
						return Err(PskImportError::UnsupportedChunk {
							tag: chunk.tag().to_string(),
							count: chunk.record_count(),
						});
					}
				},
				ChunkKind::Materials => {
					model.materials.extend(records(buf, &chunk, MATERIAL_SIZE, Material::read)?);
				},
				ChunkKind::RefSkeleton => {
					model.bones.extend(records(buf, &chunk, BONE_SIZE, Bone::read)?);
				},
				ChunkKind::RawWeights => {
					model.weights.extend(records(buf, &chunk, RAW_WEIGHT_SIZE, RawWeight::read)?);
				},
				ChunkKind::ExtraUvs => {
					if cfg.flags.contains(ImportFlag::SKIP_EXTRA_UVS) {
						skip_payload(buf, &chunk)?;
					} else {
						model.extra_uvs.push(records(buf, &chunk, EXTRA_UV_SIZE, |b| b.read_vec2_le())?);
					}
				},
				ChunkKind::VertexNormals => {
					model.normals.extend(records(buf, &chunk, NORMAL_SIZE, |b| b.read_vec3_le())?);
				},
				// A second ACTRHEAD carries no records we understand either
				ChunkKind::ActorHead | ChunkKind::Unknown => {
					if cfg.flags.contains(ImportFlag::STRICT_CHUNKS) {
						return Err(PskImportError::UnknownChunk(chunk.tag().to_string()));
					}

					log::warn!("Skipping unknown chunk {:?} ({} bytes)", chunk.tag(), chunk.payload_len());
					skip_payload(buf, &chunk)?;
				},
			}
		}

		Ok(model)
	}

	/// Decodes a PSK file already held in memory
	#[cfg(feature = "import")]
	pub fn from_bytes(data: &[u8], cfg: &ImportCfg) -> Result<PskModel, PskImportError> {
		PskModel::read(&mut Cursor::new(data), cfg)
	}

	/// The opening ACTRHEAD header
	pub fn header(&self) -> &ChunkHeader {
		&self.header
	}

	pub fn points(&self) -> &[Point] {
		&self.points
	}

	pub fn wedges(&self) -> &[Wedge] {
		&self.wedges
	}

	pub fn triangles(&self) -> &[Triangle] {
		&self.triangles
	}

	pub fn materials(&self) -> &[Material] {
		&self.materials
	}

	pub fn bones(&self) -> &[Bone] {
		&self.bones
	}

	pub fn weights(&self) -> &[RawWeight] {
		&self.weights
	}

	/// Additional UV sets, one per EXTRAUVS<n> chunk in file order, each indexed like the wedges
	pub fn extra_uvs(&self) -> &[Vec<Vec2>] {
		&self.extra_uvs
	}

	/// Per-point normals, empty unless the file has a VTXNORMS chunk
	pub fn normals(&self) -> &[Vec3] {
		&self.normals
	}
}

#[cfg(feature = "import")]
pub mod import {
	use std::io::{
		self,
		Cursor,
		ErrorKind
	};

	use thiserror::Error;

	use rgk_core::io_ext::CursorExt;

	use super::ChunkHeader;

	#[derive(Error, Debug)]
	pub enum PskImportError {
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Not a PSK file: {0:?}")]
		Magic(String),
		#[error("Unexpected end of data at offset {offset:#x} while reading {context}")]
		OutOfData {
			context: String,
			offset: u64,
		},
		#[error("Chunk {tag} declares {data_count} records of {data_size} bytes")]
		ChunkSize {
			tag: String,
			data_size: i32,
			data_count: i32,
		},
		#[error("Unknown chunk: {0:?}")]
		UnknownChunk(String),
		#[error("Unsupported chunk variant {tag} with {count} records")]
		UnsupportedChunk {
			tag: String,
			count: usize,
		},
	}

	impl PskImportError {
		/// Wraps a read failure that started at `offset`
		fn at(err: io::Error, context: &str, offset: u64) -> PskImportError {
			match err.kind() {
				ErrorKind::UnexpectedEof => PskImportError::OutOfData {
					context: context.to_string(),
					offset: offset,
				},
				_ => PskImportError::IO { source: err },
			}
		}
	}

	pub(crate) fn read_header<T>(buf: &mut Cursor<T>) -> Result<ChunkHeader, PskImportError>
	where
		T: AsRef<[u8]>,
	{
		let offset = buf.position();
		ChunkHeader::read(buf).map_err(|e| PskImportError::at(e, "chunk header", offset))
	}

	/// Decodes every record of `chunk` with `read`
	pub(crate) fn records<T, O, F>(buf: &mut Cursor<T>, chunk: &ChunkHeader, size: usize, mut read: F)
		-> Result<Vec<O>, PskImportError>
	where
		T: AsRef<[u8]>,
		F: FnMut(&mut Cursor<T>) -> io::Result<O>,
	{
		let count = chunk.record_count();
		let mut out = Vec::with_capacity(count.min(buf.remaining() / size));

		for _ in 0..count {
			let offset = buf.position();
			out.push(read(&mut *buf).map_err(|e| PskImportError::at(e, chunk.tag(), offset))?);
		}

		Ok(out)
	}

	/// Moves past the declared payload of `chunk`.
	/// Records without a positive size cannot be skipped, so the next header could not be found.
	pub(crate) fn skip_payload<T>(buf: &mut Cursor<T>, chunk: &ChunkHeader) -> Result<(), PskImportError>
	where
		T: AsRef<[u8]>,
	{
		if chunk.record_count() > 0 && chunk.data_size <= 0 {
			return Err(PskImportError::ChunkSize {
				tag: chunk.tag().to_string(),
				data_size: chunk.data_size,
				data_count: chunk.data_count,
			});
		}

		let offset = buf.position();
		buf.skip(chunk.payload_len()).map_err(|e| PskImportError::at(e, chunk.tag(), offset))
	}

}
