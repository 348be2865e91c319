//! Gaussian splat PLY loader
//!
//! Reads the binary little-endian PLY files written by 3D Gaussian Splatting
//! trainers. The header is ASCII; the body is a packed array of vertex records
//! whose layout is given by the `property` lines.

use crate::foundation::math::utils::sigmoid;
use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Zeroth-order spherical harmonic basis constant
pub const SH_C0: f32 = 0.282_094_8;

/// Number of higher-order SH coefficients stored per splat (degree 3, RGB)
pub const SH_REST_COUNT: usize = 45;

/// Records reserved up front; larger clouds grow as the body is read
const MAX_PREALLOCATED_SPLATS: usize = 1 << 16;

/// Errors produced while reading a splat file
#[derive(Error, Debug)]
pub enum SplatLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Missing required property: {0}")]
    MissingProperty(String),
    #[error("Truncated body: expected {expected} vertices, read {read}")]
    Truncated { expected: usize, read: usize },
    #[error("Empty file path")]
    EmptyPath,
}

/// Scalar types allowed in `property` declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyScalar {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyScalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::Char,
            "uchar" | "uint8" => Self::UChar,
            "short" | "int16" => Self::Short,
            "ushort" | "uint16" => Self::UShort,
            "int" | "int32" => Self::Int,
            "uint" | "uint32" => Self::UInt,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            _ => return None,
        })
    }

    /// Size of one value in bytes
    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn read_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::Char => bytes[0] as i8 as f32,
            Self::UChar => bytes[0] as f32,
            Self::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::UShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::Int => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::UInt => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw) as f32
            }
        }
    }
}

/// One `property` line of the vertex element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyProperty {
    pub name: String,
    pub scalar: PlyScalar,
    /// Byte offset inside one vertex record
    pub offset: usize,
}

/// Parsed PLY header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    pub vertex_count: usize,
    pub properties: Vec<PlyProperty>,
    /// Size of one vertex record in bytes
    pub stride: usize,
    /// Bytes taken by the header, including `end_header`
    pub header_len: usize,
}

impl PlyHeader {
    /// Parse the ASCII header, leaving the reader positioned at the body
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self, SplatLoadError> {
        let mut line = String::new();
        let mut header_len = reader.read_line(&mut line)?;
        if line.trim_end() != "ply" {
            return Err(SplatLoadError::InvalidHeader("missing 'ply' magic".to_string()));
        }

        let mut format_seen = false;
        let mut vertex_count = None;
        let mut in_vertex_element = false;
        let mut properties = Vec::new();
        let mut stride = 0;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Err(SplatLoadError::InvalidHeader("missing 'end_header'".to_string()));
            }
            header_len += read;

            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [] | ["comment", ..] | ["obj_info", ..] => {}
                ["format", "binary_little_endian", _version] => format_seen = true,
                ["format", other, ..] => {
                    return Err(SplatLoadError::UnsupportedFormat(other.to_string()));
                }
                ["element", "vertex", count] => {
                    let count = count.parse().map_err(|_| {
                        SplatLoadError::InvalidHeader(format!("invalid vertex count '{count}'"))
                    })?;
                    vertex_count = Some(count);
                    in_vertex_element = true;
                }
                ["element", name, _] => {
                    // Elements after the vertex block are never read.
                    log::debug!("Ignoring PLY element '{}'", name);
                    in_vertex_element = false;
                }
                ["property", "list", ..] if in_vertex_element => {
                    return Err(SplatLoadError::UnsupportedFormat(
                        "list properties on vertex element".to_string(),
                    ));
                }
                ["property", ty, name] if in_vertex_element => {
                    let scalar = PlyScalar::parse(ty).ok_or_else(|| {
                        SplatLoadError::UnsupportedFormat(format!("property type '{ty}'"))
                    })?;
                    properties.push(PlyProperty {
                        name: name.to_string(),
                        scalar,
                        offset: stride,
                    });
                    stride += scalar.size();
                }
                ["property", ..] => {}
                ["end_header"] => break,
                _ => {
                    return Err(SplatLoadError::InvalidHeader(format!("unexpected line '{}'", line.trim_end())));
                }
            }
        }

        if !format_seen {
            return Err(SplatLoadError::InvalidHeader("missing 'format' line".to_string()));
        }

        let vertex_count = vertex_count
            .ok_or_else(|| SplatLoadError::InvalidHeader("missing vertex element".to_string()))?;

        let header = Self {
            vertex_count,
            properties,
            stride,
            header_len,
        };
        if header.body_len().is_none() {
            return Err(SplatLoadError::InvalidHeader(format!(
                "{} vertices of {} bytes overflow the addressable size",
                vertex_count, stride
            )));
        }
        Ok(header)
    }

    /// Bytes the vertex block occupies, `None` on overflow
    pub fn body_len(&self) -> Option<u64> {
        let count = u64::try_from(self.vertex_count).ok()?;
        count.checked_mul(self.stride as u64)
    }

    /// Fail unless `available` bytes can hold every declared vertex
    pub fn check_body_fits(&self, available: u64) -> Result<(), SplatLoadError> {
        match self.body_len() {
            Some(needed) if needed <= available => Ok(()),
            _ => Err(SplatLoadError::Truncated {
                expected: self.vertex_count,
                read: usize::try_from(available / self.stride.max(1) as u64).unwrap_or(usize::MAX),
            }),
        }
    }

    fn find(&self, name: &str) -> Option<&PlyProperty> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// Where each field of a [`GaussianSurface`] sits inside a vertex record
///
/// Resolved once per file; fields the file does not carry read as zero.
struct SurfaceLayout<'h> {
    position: [Option<&'h PlyProperty>; 3],
    normal: [Option<&'h PlyProperty>; 3],
    f_dc: [Option<&'h PlyProperty>; 3],
    f_rest: [Option<&'h PlyProperty>; SH_REST_COUNT],
    opacity: Option<&'h PlyProperty>,
    scale: [Option<&'h PlyProperty>; 3],
    rotation: [Option<&'h PlyProperty>; 4],
}

impl<'h> SurfaceLayout<'h> {
    fn new(header: &'h PlyHeader) -> Self {
        Self {
            position: ["x", "y", "z"].map(|name| header.find(name)),
            normal: ["nx", "ny", "nz"].map(|name| header.find(name)),
            f_dc: ["f_dc_0", "f_dc_1", "f_dc_2"].map(|name| header.find(name)),
            f_rest: std::array::from_fn(|i| header.find(&format!("f_rest_{i}"))),
            opacity: header.find("opacity"),
            scale: ["scale_0", "scale_1", "scale_2"].map(|name| header.find(name)),
            rotation: ["rot_0", "rot_1", "rot_2", "rot_3"].map(|name| header.find(name)),
        }
    }

    fn read(&self, record: &[u8]) -> GaussianSurface {
        let value = |property: Option<&PlyProperty>| {
            property.map_or(0.0, |p| p.scalar.read_f32(&record[p.offset..p.offset + p.scalar.size()]))
        };

        GaussianSurface {
            position: self.position.map(value),
            normal: self.normal.map(value),
            f_dc: self.f_dc.map(value),
            f_rest: self.f_rest.map(value),
            opacity: value(self.opacity),
            scale: self.scale.map(value),
            rotation: self.rotation.map(value),
        }
    }
}

/// Raw splat record as stored in the file (pre-activation values)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianSurface {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub f_dc: [f32; 3],
    pub f_rest: [f32; SH_REST_COUNT],
    /// Opacity logit
    pub opacity: f32,
    /// Log scale
    pub scale: [f32; 3],
    /// Unnormalized rotation, w first
    pub rotation: [f32; 4],
}

impl Default for GaussianSurface {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            f_dc: [0.0; 3],
            f_rest: [0.0; SH_REST_COUNT],
            opacity: 0.0,
            scale: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Packed `vec4` for std430 storage buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuVec4(pub [f32; 4]);

/// Structure-of-arrays splat data ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplatCloud {
    pub positions: Vec<GpuVec4>,
    pub scales: Vec<GpuVec4>,
    pub colors: Vec<GpuVec4>,
    pub quaternions: Vec<GpuVec4>,
    pub alphas: Vec<f32>,
}

impl SplatCloud {
    /// Activate the raw records: exponentiate scales, normalize rotations,
    /// squash opacity and convert the DC term to a base color
    pub fn from_surfaces(surfaces: &[GaussianSurface]) -> Self {
        let mut cloud = Self {
            positions: Vec::with_capacity(surfaces.len()),
            scales: Vec::with_capacity(surfaces.len()),
            colors: Vec::with_capacity(surfaces.len()),
            quaternions: Vec::with_capacity(surfaces.len()),
            alphas: Vec::with_capacity(surfaces.len()),
        };

        for surface in surfaces {
            let [x, y, z] = surface.position;
            cloud.positions.push(GpuVec4([x, y, z, 1.0]));

            let [s0, s1, s2] = surface.scale;
            cloud.scales.push(GpuVec4([s0.exp(), s1.exp(), s2.exp(), 0.0]));

            cloud.quaternions.push(GpuVec4(normalize_quaternion(surface.rotation)));

            let color = surface.f_dc.map(|dc| (0.5 + SH_C0 * dc).clamp(0.0, 1.0));
            cloud.colors.push(GpuVec4([color[0], color[1], color[2], 1.0]));

            cloud.alphas.push(sigmoid(surface.opacity));
        }

        cloud
    }

    /// Number of splats
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when no splats are loaded
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Normalize a (w, x, y, z) quaternion; a zero quaternion becomes identity
pub fn normalize_quaternion(q: [f32; 4]) -> [f32; 4] {
    let length = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    if length <= f32::EPSILON {
        return [1.0, 0.0, 0.0, 0.0];
    }
    q.map(|c| c / length)
}

const REQUIRED_PROPERTIES: &[&str] = &[
    "x", "y", "z",
    "f_dc_0", "f_dc_1", "f_dc_2",
    "opacity",
    "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

/// Reads the raw records of a splat PLY file
pub struct SplatLoader;

impl SplatLoader {
    /// Load raw records from a file
    pub fn load_surfaces<P: AsRef<Path>>(path: P) -> Result<Vec<GaussianSurface>, SplatLoadError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(SplatLoadError::EmptyPath);
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = PlyHeader::parse(&mut reader)?;
        header.check_body_fits(file_len.saturating_sub(header.header_len as u64))?;
        Self::read_body(&header, &mut reader)
    }

    /// Load a file and activate it into upload-ready arrays
    pub fn load_splats<P: AsRef<Path>>(path: P) -> Result<SplatCloud, SplatLoadError> {
        let path = path.as_ref();
        let surfaces = Self::load_surfaces(path)?;
        log::info!("Loaded {} splats from {}", surfaces.len(), path.display());
        Ok(SplatCloud::from_surfaces(&surfaces))
    }

    /// Parse header and body from any buffered reader
    pub fn read_surfaces<R: BufRead>(reader: &mut R) -> Result<Vec<GaussianSurface>, SplatLoadError> {
        let header = PlyHeader::parse(reader)?;
        Self::read_body(&header, reader)
    }

    fn read_body<R: Read>(header: &PlyHeader, reader: &mut R) -> Result<Vec<GaussianSurface>, SplatLoadError> {
        for name in REQUIRED_PROPERTIES {
            if header.find(name).is_none() {
                return Err(SplatLoadError::MissingProperty(name.to_string()));
            }
        }

        let layout = SurfaceLayout::new(header);
        let mut record = vec![0u8; header.stride];
        // The count comes from the file; the body proves it
        let mut surfaces = Vec::with_capacity(header.vertex_count.min(MAX_PREALLOCATED_SPLATS));

        for read in 0..header.vertex_count {
            if let Err(err) = reader.read_exact(&mut record) {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    return Err(SplatLoadError::Truncated {
                        expected: header.vertex_count,
                        read,
                    });
                }
                return Err(err.into());
            }

            surfaces.push(layout.read(&record));
        }

        Ok(surfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn build_ply(properties: &[(&str, &str)], rows: &[Vec<f64>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ply\nformat binary_little_endian 1.0\ncomment test\n");
        bytes.extend_from_slice(format!("element vertex {}\n", rows.len()).as_bytes());
        for (ty, name) in properties {
            bytes.extend_from_slice(format!("property {ty} {name}\n").as_bytes());
        }
        bytes.extend_from_slice(b"end_header\n");

        for row in rows {
            for ((ty, _), value) in properties.iter().zip(row) {
                match *ty {
                    "float" => bytes.extend_from_slice(&(*value as f32).to_le_bytes()),
                    "double" => bytes.extend_from_slice(&value.to_le_bytes()),
                    "uchar" => bytes.push(*value as u8),
                    "short" => bytes.extend_from_slice(&(*value as i16).to_le_bytes()),
                    other => panic!("unsupported test type {other}"),
                }
            }
        }
        bytes
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        REQUIRED_PROPERTIES.iter().map(|name| ("float", *name)).collect()
    }

    /// Header declaring `count` float vertices with the required properties
    fn header_declaring(count: &str) -> Vec<u8> {
        let mut bytes = format!("ply\nformat binary_little_endian 1.0\nelement vertex {count}\n").into_bytes();
        for name in REQUIRED_PROPERTIES {
            bytes.extend_from_slice(format!("property float {name}\n").as_bytes());
        }
        bytes.extend_from_slice(b"end_header\n");
        bytes
    }

    #[test]
    fn test_header_parsing() {
        let bytes = build_ply(&[("float", "x"), ("uchar", "red"), ("double", "y")], &[]);
        let header = PlyHeader::parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(header.vertex_count, 0);
        assert_eq!(header.stride, 4 + 1 + 8);
        assert_eq!(header.properties[1].offset, 4);
        assert_eq!(header.properties[2].scalar, PlyScalar::Double);
        assert_eq!(header.properties[2].offset, 5);
    }

    #[test]
    fn test_ascii_format_rejected() {
        let text = b"ply\nformat ascii 1.0\nelement vertex 0\nend_header\n".to_vec();
        assert!(matches!(
            PlyHeader::parse(&mut Cursor::new(text)),
            Err(SplatLoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_magic_rejected() {
        let text = b"not a ply\n".to_vec();
        assert!(matches!(
            PlyHeader::parse(&mut Cursor::new(text)),
            Err(SplatLoadError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_missing_required_property() {
        let properties: Vec<_> = required().into_iter().filter(|(_, name)| *name != "opacity").collect();
        let bytes = build_ply(&properties, &[vec![0.0; properties.len()]]);

        match SplatLoader::read_surfaces(&mut Cursor::new(bytes)) {
            Err(SplatLoadError::MissingProperty(name)) => assert_eq!(name, "opacity"),
            other => panic!("expected missing property, got {other:?}"),
        }
    }

    #[test]
    fn test_extra_properties_skipped_and_optional_zeroed() {
        let mut properties = vec![("uchar", "red"), ("short", "label")];
        properties.extend(required());
        properties.push(("double", "f_rest_7"));

        let mut row = vec![200.0, -3.0];
        row.extend((0..REQUIRED_PROPERTIES.len()).map(|i| i as f64));
        row.push(0.25);

        let bytes = build_ply(&properties, &[row]);
        let surfaces = SplatLoader::read_surfaces(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(surfaces.len(), 1);
        let surface = &surfaces[0];
        assert_eq!(surface.position, [0.0, 1.0, 2.0]);
        assert_eq!(surface.f_dc, [3.0, 4.0, 5.0]);
        assert_eq!(surface.opacity, 6.0);
        assert_eq!(surface.scale, [7.0, 8.0, 9.0]);
        assert_eq!(surface.rotation, [10.0, 11.0, 12.0, 13.0]);
        assert_eq!(surface.normal, [0.0; 3]);
        assert_relative_eq!(surface.f_rest[7], 0.25);
        assert_eq!(surface.f_rest[0], 0.0);
    }

    #[test]
    fn test_truncated_body() {
        let properties = required();
        let mut bytes = build_ply(&properties, &[vec![0.0; properties.len()], vec![0.0; properties.len()]]);
        bytes.truncate(bytes.len() - 3);

        assert!(matches!(
            SplatLoader::read_surfaces(&mut Cursor::new(bytes)),
            Err(SplatLoadError::Truncated { expected: 2, read: 1 })
        ));
    }

    #[test]
    fn test_huge_vertex_count_without_body_is_error() {
        let bytes = header_declaring("4000000000000");

        match SplatLoader::read_surfaces(&mut Cursor::new(bytes)) {
            Err(SplatLoadError::Truncated { expected, read }) => {
                assert_eq!(expected, 4_000_000_000_000);
                assert_eq!(read, 0);
            }
            other => panic!("expected truncated body, got {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_body_size_rejected() {
        let bytes = header_declaring(&usize::MAX.to_string());
        assert!(matches!(
            PlyHeader::parse(&mut Cursor::new(bytes)),
            Err(SplatLoadError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_file_shorter_than_declared_body() {
        let properties = required();
        let row = build_ply(&properties, &[vec![0.0; properties.len()]]);
        let mut bytes = header_declaring("1000");
        let header_len = bytes.len();
        bytes.extend_from_slice(&row[row.len() - 4 * properties.len()..]);

        let header = PlyHeader::parse(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(header.header_len, header_len);
        assert_eq!(header.body_len(), Some(1000 * 4 * properties.len() as u64));

        let path = std::env::temp_dir().join(format!("splat_short_body_{}.ply", std::process::id()));
        std::fs::write(&path, &bytes).unwrap();
        let result = SplatLoader::load_surfaces(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(SplatLoadError::Truncated { expected: 1000, read: 1 })));
    }

    #[test]
    fn test_every_sh_coefficient_read_from_its_offset() {
        let rest: Vec<String> = (0..SH_REST_COUNT).map(|i| format!("f_rest_{i}")).collect();
        let mut properties: Vec<(&str, &str)> = required();
        properties.extend(rest.iter().map(|name| ("float", name.as_str())));

        let mut row = vec![0.0; REQUIRED_PROPERTIES.len()];
        row.extend((0..SH_REST_COUNT).map(|i| i as f64 * 0.5));

        let bytes = build_ply(&properties, &[row.clone(), row]);
        let surfaces = SplatLoader::read_surfaces(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(surfaces.len(), 2);
        for surface in &surfaces {
            for (i, coefficient) in surface.f_rest.iter().enumerate() {
                assert_relative_eq!(*coefficient, i as f32 * 0.5);
            }
        }
    }

    #[test]
    fn test_empty_path_is_error() {
        assert!(matches!(SplatLoader::load_splats(""), Err(SplatLoadError::EmptyPath)));
        assert!(SplatLoader::load_splats("definitely/not/here.ply").is_err());
    }

    #[test]
    fn test_activation_transform() {
        let raw = [
            GaussianSurface {
                scale: [0.0, -1.0, 2.0],
                rotation: [2.0, 0.0, 0.0, 0.0],
                opacity: 0.0,
                f_dc: [0.0, 10.0, -10.0],
                ..GaussianSurface::default()
            },
            GaussianSurface {
                scale: [-4.0, 0.5, 0.1],
                rotation: [0.3, -0.7, 1.1, 2.5],
                opacity: 3.0,
                ..GaussianSurface::default()
            },
            GaussianSurface {
                rotation: [0.0; 4],
                opacity: -2.0,
                ..GaussianSurface::default()
            },
        ];

        let cloud = SplatCloud::from_surfaces(&raw);
        assert_eq!(cloud.len(), 3);

        for (surface, i) in raw.iter().zip(0..) {
            for axis in 0..3 {
                assert_relative_eq!(cloud.scales[i].0[axis], surface.scale[axis].exp(), epsilon = 1e-6);
            }
            let q = cloud.quaternions[i].0;
            let norm = q.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
            assert_relative_eq!(cloud.alphas[i], sigmoid(surface.opacity), epsilon = 1e-6);
        }

        assert_eq!(cloud.quaternions[2].0, [1.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(cloud.alphas[0], 0.5);
        assert_relative_eq!(cloud.colors[0].0[0], 0.5);
        assert_relative_eq!(cloud.colors[0].0[1], 1.0);
        assert_relative_eq!(cloud.colors[0].0[2], 0.0);
    }

    #[test]
    fn test_sigmoid_monotonic() {
        let samples: Vec<f32> = (-50..=50).map(|i| sigmoid(i as f32 * 0.2)).collect();
        assert!(samples.windows(2).all(|pair| pair[0] < pair[1] || pair[1] == 1.0));
        assert_relative_eq!(sigmoid(0.0), 0.5);
    }
}
