//! Meshopt index codecs.
//!
//! - **Triangles** (`0xE1`): one code byte per triangle, a stream of aux
//!   bytes and varint deltas, then a 16-byte code table. Edges and vertices
//!   are matched against two 16-entry FIFOs so strips and fans cost about one
//!   byte per triangle.
//! - **Sequence** (`0xD1`): one zigzag varint delta per index against one of
//!   two baselines, then 4 zero bytes.

use super::MeshoptError;

pub const TRIANGLE_HEADER: u8 = 0xE0;
pub const SEQUENCE_HEADER: u8 = 0xD0;
const INDEX_VERSION: u8 = 1;

/// Aux codes reachable through the one-byte table path; the last two slots are unused.
const CODE_AUX_TABLE: [u8; 16] = [
    0x00, 0x76, 0x87, 0x56, 0x67, 0x78, 0xa9, 0x86, 0x65, 0x89, 0x68, 0x98, 0x01, 0x69, 0x00, 0x00,
];

/// Triangle codes at or past this value in the edge path encode free indices.
const FEC_MAX: u32 = 13;

const UNSET: u32 = u32::MAX;

// ============================================================================
// Varints
// ============================================================================

fn encode_vbyte(out: &mut Vec<u8>, mut v: u32) {
    while v >= 128 {
        out.push((v & 127) as u8 | 128);
        v >>= 7;
    }
    out.push(v as u8);
}

fn decode_vbyte(data: &[u8], cursor: &mut usize) -> Result<u32, MeshoptError> {
    let mut result = 0u32;
    for i in 0..5 {
        let byte = *data.get(*cursor).ok_or(MeshoptError::Truncated)?;
        *cursor += 1;
        result |= u32::from(byte & 127) << (7 * i);
        if byte < 128 {
            break;
        }
    }
    Ok(result)
}

fn encode_delta(out: &mut Vec<u8>, index: u32, last: u32) {
    let d = index.wrapping_sub(last);
    encode_vbyte(out, (d << 1) ^ ((d as i32 >> 31) as u32));
}

fn decode_delta(data: &[u8], cursor: &mut usize, last: u32) -> Result<u32, MeshoptError> {
    let v = decode_vbyte(data, cursor)?;
    let d = (v >> 1) ^ 0u32.wrapping_sub(v & 1);
    Ok(last.wrapping_add(d))
}

// ============================================================================
// FIFOs
// ============================================================================

struct Fifos {
    edges: [[u32; 2]; 16],
    edge_offset: usize,
    vertices: [u32; 16],
    vertex_offset: usize,
}

impl Fifos {
    fn new() -> Self {
        Self {
            edges: [[UNSET; 2]; 16],
            edge_offset: 0,
            vertices: [UNSET; 16],
            vertex_offset: 0,
        }
    }

    fn push_edge(&mut self, a: u32, b: u32) {
        self.edges[self.edge_offset] = [a, b];
        self.edge_offset = (self.edge_offset + 1) & 15;
    }

    fn push_vertex(&mut self, v: u32, advance: bool) {
        self.vertices[self.vertex_offset] = v;
        self.vertex_offset = (self.vertex_offset + usize::from(advance)) & 15;
    }

    /// Edge `distance` entries back from the most recent one.
    fn edge(&self, distance: usize) -> [u32; 2] {
        self.edges[(self.edge_offset + 15 - distance) & 15]
    }

    /// Vertex `distance` entries back, where 0 is the slot about to be written.
    fn vertex(&self, distance: usize) -> u32 {
        self.vertices[(self.vertex_offset + 16 - distance) & 15]
    }

    /// Distance of the edge `a b` counting the most recent edge as 0.
    fn find_edge(&self, a: u32, b: u32) -> Option<usize> {
        (0..16).find(|&i| self.edge(i) == [a, b])
    }

    /// Distance of `v` counting the most recent vertex as 0.
    fn find_vertex(&self, v: u32) -> Option<usize> {
        (0..16).find(|&i| self.vertex(i + 1) == v)
    }
}

// ============================================================================
// Triangle codec
// ============================================================================

/// Encodes a triangle list. Triangles keep their vertex order, so decoding
/// reproduces the input exactly.
pub fn encode_triangles(indices: &[u32]) -> Result<Vec<u8>, MeshoptError> {
    if indices.len() % 3 != 0 {
        return Err(MeshoptError::InvalidIndexCount(indices.len()));
    }
    let triangles = indices.len() / 3;
    let mut codes = Vec::with_capacity(triangles);
    let mut data = Vec::new();
    let mut fifo = Fifos::new();
    let mut next = 0u32;
    let mut last = 0u32;

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);

        if let Some(fe) = fifo.find_edge(a, b).filter(|&fe| fe < 15) {
            let mut fec = match fifo.find_vertex(c) {
                Some(fc) if fc >= 1 && (fc as u32) < FEC_MAX => fc as u32,
                _ if c == next => {
                    next += 1;
                    0
                }
                _ => 15,
            };
            if fec == 15 {
                if c.wrapping_add(1) == last {
                    fec = 13;
                    last = c;
                } else if c == last.wrapping_add(1) {
                    fec = 14;
                    last = c;
                }
            }
            codes.push(((fe as u8) << 4) | fec as u8);
            if fec == 15 {
                encode_delta(&mut data, c, last);
                last = c;
            }
            if fec == 0 || fec >= FEC_MAX {
                fifo.push_vertex(c, true);
            }
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
            continue;
        }

        // An escaped triangle with aux 0 restarts `next` at 0 on decode.
        if a == 0 && b == 1 && c == 2 && next > 0 {
            next = 3;
            codes.push(0xFE);
            data.push(0);
            for v in [a, b, c] {
                fifo.push_vertex(v, true);
            }
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
            continue;
        }

        let fb = fifo.find_vertex(b);
        let fc = fifo.find_vertex(c);

        let fea = if a == next {
            next += 1;
            0u8
        } else {
            15
        };
        let feb = match fb {
            Some(f) if f < 14 => f as u8 + 1,
            _ if b == next => {
                next += 1;
                0
            }
            _ => 15,
        };
        let mut fec = match fc {
            Some(f) if f < 14 => f as u8 + 1,
            _ if c == next => {
                next += 1;
                0
            }
            _ => 15,
        };
        if fea == 15 && feb == 0 && fec == 0 {
            next -= 1;
            fec = 15;
        }

        let aux = (feb << 4) | fec;
        match CODE_AUX_TABLE[..14].iter().position(|&v| v == aux) {
            Some(index) if fea == 0 => codes.push(0xF0 | index as u8),
            _ => {
                codes.push(0xF0 | 14 | (fea & 1));
                data.push(aux);
            }
        }

        for (value, fe) in [(a, fea), (b, feb), (c, fec)] {
            if fe == 15 {
                encode_delta(&mut data, value, last);
                last = value;
            }
        }
        for (value, fe) in [(a, fea), (b, feb), (c, fec)] {
            if fe == 0 || fe == 15 {
                fifo.push_vertex(value, true);
            }
        }
        fifo.push_edge(b, a);
        fifo.push_edge(c, b);
        fifo.push_edge(a, c);
    }

    let mut out = Vec::with_capacity(1 + codes.len() + data.len() + CODE_AUX_TABLE.len());
    out.push(TRIANGLE_HEADER | INDEX_VERSION);
    out.extend_from_slice(&codes);
    out.extend_from_slice(&data);
    out.extend_from_slice(&CODE_AUX_TABLE);
    Ok(out)
}

/// Decodes `index_count` triangle indices.
pub fn decode_triangles(input: &[u8], index_count: usize) -> Result<Vec<u32>, MeshoptError> {
    if index_count % 3 != 0 {
        return Err(MeshoptError::InvalidIndexCount(index_count));
    }
    let triangles = index_count / 3;
    if input.len() < 1 + triangles + 16 {
        return Err(MeshoptError::Truncated);
    }
    if input[0] & 0xF0 != TRIANGLE_HEADER {
        return Err(MeshoptError::BadHeader(input[0]));
    }
    let version = input[0] & 0x0F;
    if version > 1 {
        return Err(MeshoptError::UnsupportedVersion(version));
    }
    let fec_max = if version >= 1 { 13 } else { 15 };

    let codes = &input[1..1 + triangles];
    let table_start = input.len() - 16;
    let table = &input[table_start..];
    let data = &input[..table_start];
    let mut cursor = 1 + triangles;

    let mut fifo = Fifos::new();
    let mut next = 0u32;
    let mut last = 0u32;
    let mut out = Vec::with_capacity(index_count);

    for &code in codes {
        if cursor > table_start {
            return Err(MeshoptError::Truncated);
        }
        if code < 0xF0 {
            let fe = usize::from(code >> 4);
            let [a, b] = fifo.edge(fe);
            let fec = u32::from(code & 15);
            let c = if fec < fec_max {
                let c = if fec == 0 { next } else { fifo.vertex(fec as usize + 1) };
                if fec == 0 {
                    next += 1;
                }
                fifo.push_vertex(c, fec == 0);
                c
            } else {
                last = match fec {
                    13 => last.wrapping_sub(1),
                    14 => last.wrapping_add(1),
                    _ => decode_delta(data, &mut cursor, last)?,
                };
                fifo.push_vertex(last, true);
                last
            };
            out.extend_from_slice(&[a, b, c]);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        } else if code < 0xFE {
            let aux = table[usize::from(code & 15)];
            let feb = usize::from(aux >> 4);
            let fec = usize::from(aux & 15);

            let a = next;
            next += 1;
            let b = if feb == 0 { next } else { fifo.vertex(feb) };
            if feb == 0 {
                next += 1;
            }
            let c = if fec == 0 { next } else { fifo.vertex(fec) };
            if fec == 0 {
                next += 1;
            }

            out.extend_from_slice(&[a, b, c]);
            fifo.push_vertex(a, true);
            fifo.push_vertex(b, feb == 0);
            fifo.push_vertex(c, fec == 0);
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        } else {
            let aux = *data.get(cursor).ok_or(MeshoptError::Truncated)?;
            cursor += 1;
            let fea = if code == 0xFE { 0 } else { 15 };
            let feb = usize::from(aux >> 4);
            let fec = usize::from(aux & 15);
            if aux == 0 {
                next = 0;
            }

            let mut take_next = || {
                let v = next;
                next += 1;
                v
            };
            let mut a = if fea == 0 { take_next() } else { 0 };
            let mut b = if feb == 0 { take_next() } else { fifo.vertex(feb) };
            let mut c = if fec == 0 { take_next() } else { fifo.vertex(fec) };

            if fea == 15 {
                a = decode_delta(data, &mut cursor, last)?;
                last = a;
            }
            if feb == 15 {
                b = decode_delta(data, &mut cursor, last)?;
                last = b;
            }
            if fec == 15 {
                c = decode_delta(data, &mut cursor, last)?;
                last = c;
            }

            out.extend_from_slice(&[a, b, c]);
            fifo.push_vertex(a, true);
            fifo.push_vertex(b, feb == 0 || feb == 15);
            fifo.push_vertex(c, fec == 0 || fec == 15);
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        }
    }

    if cursor != table_start {
        return Err(MeshoptError::TrailingData(table_start.saturating_sub(cursor)));
    }
    Ok(out)
}

// ============================================================================
// Sequence codec
// ============================================================================

/// Encodes an arbitrary index sequence.
pub fn encode_sequence(indices: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + indices.len() + 4);
    out.push(SEQUENCE_HEADER | INDEX_VERSION);
    let mut last = [0u32; 2];
    let mut current = 0usize;
    for &index in indices {
        let cd = index.wrapping_sub(last[current]) as i32;
        if cd.unsigned_abs() >= 30 {
            current ^= 1;
        }
        let d = index.wrapping_sub(last[current]);
        let v = (d << 1) ^ ((d as i32 >> 31) as u32);
        encode_vbyte(&mut out, (v << 1) | current as u32);
        last[current] = index;
    }
    out.extend_from_slice(&[0; 4]);
    out
}

/// Decodes `index_count` indices of a sequence stream.
pub fn decode_sequence(input: &[u8], index_count: usize) -> Result<Vec<u32>, MeshoptError> {
    if input.len() < 1 + index_count + 4 {
        return Err(MeshoptError::Truncated);
    }
    if input[0] & 0xF0 != SEQUENCE_HEADER {
        return Err(MeshoptError::BadHeader(input[0]));
    }
    let version = input[0] & 0x0F;
    if version > 1 {
        return Err(MeshoptError::UnsupportedVersion(version));
    }

    let end = input.len() - 4;
    let data = &input[..end];
    let mut cursor = 1;
    let mut last = [0u32; 2];
    let mut out = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        if cursor >= end {
            return Err(MeshoptError::Truncated);
        }
        let v = decode_vbyte(data, &mut cursor)?;
        let current = (v & 1) as usize;
        let v = v >> 1;
        let d = (v >> 1) ^ 0u32.wrapping_sub(v & 1);
        let index = last[current].wrapping_add(d);
        last[current] = index;
        out.push(index);
    }
    if cursor != end {
        return Err(MeshoptError::TrailingData(end - cursor));
    }
    Ok(out)
}
