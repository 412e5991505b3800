//! Procedural GLB assets.
//!
//! The static demo model is a box built in code, so the demo page and the
//! demo generation service work without any asset on disk.

use serde_json::json;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;

/// Quads of the box as corner indices; corner `i` takes max x/y/z when bit 0/1/2 is set.
const BOX_FACES: [[u16; 4]; 6] = [
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 2, 3, 1],
    [4, 5, 7, 6],
];

/// The demo model: a 1.6 x 1.0 x 1.2 box resting on the origin.
pub fn demo_model_glb() -> Vec<u8> {
    box_glb([0.0, 0.0, 0.0], [1.6, 1.0, 1.2], [0.0, 0.0, 0.0])
}

/// A GLB holding one box mesh spanning `min..max`, under a node translated by `translation`.
pub fn box_glb(min: [f32; 3], max: [f32; 3], translation: [f32; 3]) -> Vec<u8> {
    let mut bin = Vec::with_capacity(8 * 12 + 36 * 2);
    for corner in 0..8u8 {
        for axis in 0..3 {
            let value = if corner & (1 << axis) != 0 { max[axis] } else { min[axis] };
            bin.extend_from_slice(&value.to_le_bytes());
        }
    }
    let positions_len = bin.len();

    for [a, b, c, d] in BOX_FACES {
        for index in [a, b, c, a, c, d] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
    }
    let indices_len = bin.len() - positions_len;

    let document = json!({
        "asset": { "version": "2.0", "generator": "snapcad" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "box", "mesh": 0, "translation": translation }],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
        }],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": FLOAT,
                "count": 8,
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": UNSIGNED_SHORT,
                "count": 36,
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_len, "target": ARRAY_BUFFER },
            { "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len, "target": ELEMENT_ARRAY_BUFFER }
        ],
        "buffers": [{ "byteLength": bin.len() }]
    });

    encode_glb(document.to_string().into_bytes(), bin)
}

/// Pack a JSON document and binary buffer into the GLB container.
fn encode_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Vec<u8> {
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
