//! Reader for the PLY meshes written by the Draco command-line decoder.
//!
//! Handles `ascii` and `binary_little_endian` bodies. Only the `vertex`
//! (x/y/z, optional nx/ny/nz) and `face` (index list) elements are kept;
//! other elements and properties are skipped. Polygons are fan-triangulated.

const END_HEADER: &[u8] = b"end_header";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Result<Self, String> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => return Err(format!("unknown property type {other:?}")),
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { name: String, count: Scalar, item: Scalar },
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
}

/// Triangle mesh read from a PLY file.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PlyMesh {
    pub positions: Vec<[f32; 3]>,
    /// Present only when every vertex carries nx/ny/nz.
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Vec<u32>,
}

/// Source of property values, either whitespace tokens or packed little-endian data.
enum Body<'a> {
    Ascii(std::str::SplitAsciiWhitespace<'a>),
    Binary { bytes: &'a [u8], pos: usize },
}

impl Body<'_> {
    fn read(&mut self, ty: Scalar) -> Result<f64, String> {
        match self {
            Body::Ascii(tokens) => tokens
                .next()
                .ok_or_else(|| "unexpected end of data".to_string())?
                .parse::<f64>()
                .map_err(|e| format!("bad value: {e}")),
            Body::Binary { bytes, pos } => {
                let end = *pos + ty.size();
                let raw = bytes
                    .get(*pos..end)
                    .ok_or_else(|| "unexpected end of data".to_string())?;
                *pos = end;
                Ok(match ty {
                    Scalar::I8 => f64::from(raw[0] as i8),
                    Scalar::U8 => f64::from(raw[0]),
                    Scalar::I16 => f64::from(i16::from_le_bytes([raw[0], raw[1]])),
                    Scalar::U16 => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
                    Scalar::I32 => f64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    Scalar::U32 => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    Scalar::F32 => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    Scalar::F64 => {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(raw);
                        f64::from_le_bytes(b)
                    }
                })
            }
        }
    }
}

pub(crate) fn parse(bytes: &[u8]) -> Result<PlyMesh, String> {
    let header_end = bytes
        .windows(END_HEADER.len())
        .position(|w| w == END_HEADER)
        .ok_or_else(|| "missing end_header".to_string())?;
    let header = std::str::from_utf8(&bytes[..header_end])
        .map_err(|_| "header is not UTF-8".to_string())?;
    // Body starts after the newline that ends the end_header line.
    let body_start = bytes[header_end..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| header_end + i + 1)
        .unwrap_or(bytes.len());

    let (format, elements) = parse_header(header)?;
    let mut body = match format {
        Format::Ascii => Body::Ascii(
            std::str::from_utf8(&bytes[body_start..])
                .map_err(|_| "ascii body is not UTF-8".to_string())?
                .split_ascii_whitespace(),
        ),
        Format::BinaryLittleEndian => Body::Binary {
            bytes: &bytes[body_start..],
            pos: 0,
        },
    };

    let mut mesh = PlyMesh::default();
    for element in &elements {
        match element.name.as_str() {
            "vertex" => read_vertices(element, &mut body, &mut mesh)?,
            "face" => read_faces(element, &mut body, &mut mesh)?,
            _ => skip(element, &mut body)?,
        }
    }

    if mesh.positions.is_empty() {
        return Err("no vertices".into());
    }
    let vertex_count = mesh.positions.len() as u32;
    if let Some(bad) = mesh.indices.iter().find(|i| **i >= vertex_count) {
        return Err(format!("face index {bad} out of range for {vertex_count} vertices"));
    }
    Ok(mesh)
}

fn parse_header(header: &str) -> Result<(Format, Vec<Element>), String> {
    let mut lines = header.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("ply") {
        return Err("not a PLY file".into());
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();
    for line in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["format", "ascii", _] => format = Some(Format::Ascii),
            ["format", "binary_little_endian", _] => format = Some(Format::BinaryLittleEndian),
            ["format", other, _] => return Err(format!("unsupported format {other}")),
            ["comment", ..] | ["obj_info", ..] => {}
            ["element", name, count] => elements.push(Element {
                name: (*name).to_string(),
                count: count
                    .parse()
                    .map_err(|_| format!("bad element count {count:?}"))?,
                properties: Vec::new(),
            }),
            ["property", "list", count, item, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| "property before element".to_string())?;
                element.properties.push(Property::List {
                    name: (*name).to_string(),
                    count: Scalar::parse(count)?,
                    item: Scalar::parse(item)?,
                });
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| "property before element".to_string())?;
                element.properties.push(Property::Scalar {
                    name: (*name).to_string(),
                    ty: Scalar::parse(ty)?,
                });
            }
            _ => return Err(format!("unexpected header line {line:?}")),
        }
    }
    let format = format.ok_or_else(|| "missing format line".to_string())?;
    Ok((format, elements))
}

fn read_vertices(element: &Element, body: &mut Body<'_>, mesh: &mut PlyMesh) -> Result<(), String> {
    let slot = |name: &str| match name {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        "nx" => Some(3),
        "ny" => Some(4),
        "nz" => Some(5),
        _ => None,
    };
    let mut present = [false; 6];
    for property in &element.properties {
        if let Property::Scalar { name, .. } = property {
            if let Some(i) = slot(name) {
                present[i] = true;
            }
        }
    }
    if !present[..3].iter().all(|p| *p) {
        return Err("vertex element lacks x/y/z".into());
    }
    let has_normals = present[3..].iter().all(|p| *p);

    mesh.positions.reserve(element.count);
    let mut normals = Vec::with_capacity(if has_normals { element.count } else { 0 });
    for _ in 0..element.count {
        let mut values = [0.0f32; 6];
        for property in &element.properties {
            match property {
                Property::Scalar { name, ty } => {
                    let v = body.read(*ty)?;
                    if let Some(i) = slot(name) {
                        values[i] = v as f32;
                    }
                }
                Property::List { count, item, .. } => skip_list(body, *count, *item)?,
            }
        }
        mesh.positions.push([values[0], values[1], values[2]]);
        if has_normals {
            normals.push([values[3], values[4], values[5]]);
        }
    }
    if has_normals {
        mesh.normals = Some(normals);
    }
    Ok(())
}

fn read_faces(element: &Element, body: &mut Body<'_>, mesh: &mut PlyMesh) -> Result<(), String> {
    for _ in 0..element.count {
        for property in &element.properties {
            match property {
                Property::List { name, count, item }
                    if name == "vertex_indices" || name == "vertex_index" =>
                {
                    let n = body.read(*count)? as usize;
                    let mut polygon = Vec::with_capacity(n);
                    for _ in 0..n {
                        polygon.push(body.read(*item)? as u32);
                    }
                    for i in 1..polygon.len().saturating_sub(1) {
                        mesh.indices
                            .extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                    }
                }
                Property::List { count, item, .. } => skip_list(body, *count, *item)?,
                Property::Scalar { ty, .. } => {
                    body.read(*ty)?;
                }
            }
        }
    }
    Ok(())
}

fn skip(element: &Element, body: &mut Body<'_>) -> Result<(), String> {
    for _ in 0..element.count {
        for property in &element.properties {
            match property {
                Property::Scalar { ty, .. } => {
                    body.read(*ty)?;
                }
                Property::List { count, item, .. } => skip_list(body, *count, *item)?,
            }
        }
    }
    Ok(())
}

fn skip_list(body: &mut Body<'_>, count: Scalar, item: Scalar) -> Result<(), String> {
    let n = body.read(count)? as usize;
    for _ in 0..n {
        body.read(item)?;
    }
    Ok(())
}
