use super::*;
use crate::audio::clip::NarrationClip;
use crate::audio::master::{MasterAudioOpts, synthesize_master};
use crate::timeline::model::{Scene, SceneId, Script};
use std::collections::HashMap;

#[test]
fn header_fields_are_standard_pcm16() {
    let mut out = Vec::new();
    write_wav_pcm16(&mut out, &[0.0, 0.5, -0.5, 1.0], 44_100, 2).unwrap();
    assert_eq!(out.len(), 44 + 8);
    assert_eq!(&out[0..4], b"RIFF");
    assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()), 36 + 8);
    assert_eq!(&out[8..16], b"WAVEfmt ");

    let h = WavHeader::parse(&out).unwrap();
    assert_eq!(h.format_tag, FORMAT_PCM);
    assert_eq!(h.channels, 2);
    assert_eq!(h.sample_rate, 44_100);
    assert_eq!(h.bits_per_sample, 16);
    assert_eq!(h.data_offset, 44);
    assert_eq!(h.data_len, 8);
    // byte rate and block align
    assert_eq!(
        u32::from_le_bytes(out[28..32].try_into().unwrap()),
        44_100 * 4
    );
    assert_eq!(u16::from_le_bytes(out[32..34].try_into().unwrap()), 4);
}

#[test]
fn decode_reads_back_quantized_samples() {
    let mut out = Vec::new();
    write_wav_pcm16(&mut out, &[0.0, 0.5, -0.5, 2.0], 8_000, 1).unwrap();
    let clip = decode_wav(&out).unwrap();
    assert_eq!(clip.sample_rate, 8_000);
    assert_eq!(clip.channels, 1);
    assert_eq!(clip.frames(), 4);
    assert!((clip.samples[1] - 0.5).abs() < 1e-3);
    assert!((clip.samples[2] + 0.5).abs() < 1e-3);
    assert!((clip.samples[3] - 1.0).abs() < 1e-3);
}

#[test]
fn decode_float32_and_skip_unknown_chunks() {
    let payload: Vec<u8> = [0.25f32, -0.75]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    let mut b = Vec::new();
    b.extend_from_slice(b"RIFF");
    b.extend_from_slice(&0u32.to_le_bytes());
    b.extend_from_slice(b"WAVE");
    b.extend_from_slice(b"LIST");
    b.extend_from_slice(&3u32.to_le_bytes());
    b.extend_from_slice(&[1, 2, 3, 0]);
    b.extend_from_slice(b"fmt ");
    b.extend_from_slice(&16u32.to_le_bytes());
    b.extend_from_slice(&FORMAT_IEEE_FLOAT.to_le_bytes());
    b.extend_from_slice(&1u16.to_le_bytes());
    b.extend_from_slice(&16_000u32.to_le_bytes());
    b.extend_from_slice(&64_000u32.to_le_bytes());
    b.extend_from_slice(&4u16.to_le_bytes());
    b.extend_from_slice(&32u16.to_le_bytes());
    b.extend_from_slice(b"data");
    b.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    b.extend_from_slice(&payload);

    let clip = decode_wav(&b).unwrap();
    assert_eq!(clip.sample_rate, 16_000);
    assert_eq!(clip.samples.as_slice(), &[0.25, -0.75]);
}

#[test]
fn rejects_non_wav_and_unsupported_encodings() {
    assert!(!WavHeader::sniff(b"ID3\x03 mp3 data"));
    assert!(decode_wav(b"ID3\x03 mp3 data").is_err());

    let mut out = Vec::new();
    write_wav_pcm16(&mut out, &[0.0], 8_000, 1).unwrap();
    // Flip bits-per-sample to 8.
    out[34] = 8;
    assert!(decode_wav(&out).is_err());
}

#[test]
fn master_buffer_serializes_with_data_length_matching_frames() {
    let script = Script::new(
        "t",
        vec![Scene {
            id: SceneId::from("a"),
            duration: 1.0,
            narration_text: String::new(),
            overlay_text: String::new(),
            image_keyword: String::new(),
        }],
    )
    .unwrap();
    let buf = synthesize_master(
        &script,
        &HashMap::<SceneId, NarrationClip>::new(),
        MasterAudioOpts::default(),
    )
    .unwrap();
    let bytes = buf.to_wav_bytes().unwrap();
    let h = WavHeader::parse(&bytes).unwrap();
    assert_eq!(h.sample_rate, 44_100);
    assert_eq!(u64::from(h.data_len), buf.frames() * 2);
}
