//! Audio filter-graph construction.
//!
//! Pure translation of a segment's sound list into the ffmpeg
//! `-filter_complex` form: one labeled chain per sound (trim, resample,
//! gain, rate change, delay) feeding a single `amix` stage. No I/O
//! happens here; input-level seeks are returned as data for the session
//! to turn into `-ss` arguments.

use std::path::PathBuf;

use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_export_model::Sound;

/// Output label of the mixed audio stream.
pub const MIX_LABEL: &str = "mix";

/// Parameters of one filter, decided at the call site.
///
/// Either a positional list (`aresample=48000`) or ordered key/value
/// pairs (`atrim=end=3.5`). Parameterless filters carry an empty
/// positional list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterParams {
    Positional(Vec<String>),
    Named(Vec<(String, String)>),
}

/// A named filter plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOp {
    pub name: String,
    pub params: FilterParams,
}

impl FilterOp {
    pub fn positional<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            params: FilterParams::Positional(args.into_iter().map(Into::into).collect()),
        }
    }

    pub fn named<I, K, V>(name: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.to_string(),
            params: FilterParams::Named(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Render as ffmpeg filter syntax, e.g. `adelay=delays=500:all=1`.
    pub fn render(&self) -> String {
        let rendered = match &self.params {
            FilterParams::Positional(args) => args
                .iter()
                .map(|a| escape_param(a))
                .collect::<Vec<_>>()
                .join(":"),
            FilterParams::Named(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}={}", escape_param(v)))
                .collect::<Vec<_>>()
                .join(":"),
        };
        if rendered.is_empty() {
            self.name.clone()
        } else {
            format!("{}={rendered}", self.name)
        }
    }
}

/// An ordered sequence of filters from labeled inputs to one labeled output.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    /// Input stream labels, without brackets (e.g. `1:a`, `snd0`).
    pub inputs: Vec<String>,
    pub ops: Vec<FilterOp>,
    /// Output stream label, without brackets.
    pub output: String,
}

impl FilterChain {
    /// Render as one `filter_complex` chain, e.g. `[1:a]aresample=48000[snd0]`.
    pub fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(|l| format!("[{l}]")).collect();
        let ops = self
            .ops
            .iter()
            .map(FilterOp::render)
            .collect::<Vec<_>>()
            .join(",");
        format!("{inputs}{ops}[{}]", self.output)
    }
}

/// One audio input of the encoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInput {
    pub path: PathBuf,

    /// Input-level pre-seek in seconds, applied before any filtering.
    pub seek: Option<f64>,
}

/// The complete audio side of one segment: inputs, per-sound chains,
/// and the final mix stage.
#[derive(Debug, Clone, Default)]
pub struct AudioGraph {
    pub inputs: Vec<SoundInput>,
    pub chains: Vec<FilterChain>,
    pub mix: Option<FilterChain>,
}

impl AudioGraph {
    /// True when the segment has no audio at all. An empty graph emits
    /// no `-filter_complex` and no audio stream mapping.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Label of the mixed output stream, when audio exists.
    pub fn output_label(&self) -> Option<&str> {
        self.mix.as_ref().map(|m| m.output.as_str())
    }

    /// Render the whole graph as the `-filter_complex` argument.
    pub fn filter_complex(&self) -> Option<String> {
        let mix = self.mix.as_ref()?;
        let mut chains: Vec<String> = self.chains.iter().map(FilterChain::render).collect();
        chains.push(mix.render());
        Some(chains.join(";"))
    }
}

/// Build the audio graph for one segment.
///
/// Sounds must already be scoped to the segment and re-baselined; their
/// encoder input indices start at 1 (input 0 is the raw video stream).
pub fn build_audio_graph(sounds: &[Sound], sample_rate: u32) -> ScenecastResult<AudioGraph> {
    if sample_rate == 0 {
        return Err(ScenecastError::filter_graph("sample rate must be non-zero"));
    }

    let mut graph = AudioGraph::default();
    let mut mix_inputs: Vec<String> = Vec::with_capacity(sounds.len());

    for (index, sound) in sounds.iter().enumerate() {
        if sound.playback_rate <= 0.0 {
            return Err(ScenecastError::filter_graph(format!(
                "sound '{}' has non-positive playback rate {}",
                sound.path.display(),
                sound.playback_rate
            )));
        }

        // A negative offset means the sound logically began before the
        // segment; pull the read pointer backward by that amount, scaled
        // by the playback rate so the audio stays aligned after the rate
        // change below.
        let mut trimmed_start = sound.start.unwrap_or(0.0);
        if sound.offset < 0.0 {
            trimmed_start -= sound.offset * sound.playback_rate;
        }

        let input_label = format!("{}:a", index + 1);
        let mut ops: Vec<FilterOp> = Vec::new();

        if let Some(end) = sound.end {
            // End point relative to the already-seeked position.
            ops.push(FilterOp::named(
                "atrim",
                [("end", fmt_f64(end - trimmed_start))],
            ));
        }

        // Common synchronization point: every sound is normalized to the
        // target rate before mixing or further rate changes.
        ops.push(FilterOp::positional("aresample", [sample_rate.to_string()]));

        if let Some(gain) = sound.gain {
            if gain != 0.0 {
                ops.push(FilterOp::positional(
                    "volume",
                    [format!("{}dB", fmt_f64(gain))],
                ));
            }
        }

        if sound.playback_rate != 1.0 {
            // Pitch+speed change via sample-rate reinterpretation, then
            // back to the target rate.
            let adjusted = (sample_rate as f64 * sound.playback_rate).round() as u64;
            ops.push(FilterOp::positional("asetrate", [adjusted.to_string()]));
            ops.push(FilterOp::positional("aresample", [sample_rate.to_string()]));
        }

        if sound.offset > 0.0 {
            let delay_ms = (sound.offset * 1000.0).round() as u64;
            ops.push(FilterOp::named(
                "adelay",
                [("delays", delay_ms.to_string()), ("all", "1".to_string())],
            ));
        }

        graph.inputs.push(SoundInput {
            path: sound.path.clone(),
            seek: (trimmed_start != 0.0).then_some(trimmed_start),
        });

        if ops.is_empty() {
            // Nothing to do for this sound; its raw input feeds the mix.
            mix_inputs.push(input_label);
        } else {
            let output = format!("snd{index}");
            mix_inputs.push(output.clone());
            graph.chains.push(FilterChain {
                inputs: vec![input_label],
                ops,
                output,
            });
        }
    }

    if !sounds.is_empty() {
        // Callers control gain explicitly; auto-normalization would
        // silently alter levels, and dropout fades would mask trims.
        graph.mix = Some(FilterChain {
            inputs: mix_inputs,
            ops: vec![FilterOp::named(
                "amix",
                [
                    ("inputs", sounds.len().to_string()),
                    ("dropout_transition", "0".to_string()),
                    ("normalize", "0".to_string()),
                ],
            )],
            output: MIX_LABEL.to_string(),
        });
    }

    Ok(graph)
}

/// Shortest decimal form of a float (`-6` rather than `-6.0`, `0.5` as is).
fn fmt_f64(value: f64) -> String {
    value.to_string()
}

/// Escape ffmpeg filter-option delimiters in a parameter value.
fn escape_param(value: &str) -> String {
    if !value.contains([':', ',', '[', ']', '\\', '\'']) {
        return value.to_string();
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        if matches!(ch, ':' | ',' | '[' | ']' | '\\' | '\'') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sound(path: &str) -> Sound {
        Sound::new(path)
    }

    #[test]
    fn empty_sound_list_builds_empty_graph() {
        let graph = build_audio_graph(&[], 48000).unwrap();
        assert!(graph.is_empty());
        assert!(graph.filter_complex().is_none());
        assert!(graph.output_label().is_none());
    }

    #[test]
    fn default_sound_gets_only_the_resample_stage() {
        let graph = build_audio_graph(&[sound("a.wav")], 48000).unwrap();
        assert_eq!(graph.chains.len(), 1);
        assert_eq!(graph.chains[0].ops.len(), 1);
        assert_eq!(graph.chains[0].ops[0].render(), "aresample=48000");
        assert_eq!(graph.inputs[0].seek, None);
    }

    #[test]
    fn negative_offset_becomes_a_rate_scaled_pre_seek() {
        let mut s = sound("a.wav");
        s.offset = -2.0;
        s.start = Some(1.0);
        s.playback_rate = 1.5;
        s.end = Some(10.0);

        let graph = build_audio_graph(&[s], 48000).unwrap();
        // trimmed_start = 1.0 - (-2.0 * 1.5) = 4.0
        assert_eq!(graph.inputs[0].seek, Some(4.0));
        // atrim end is expressed relative to the seeked position.
        assert_eq!(graph.chains[0].ops[0].render(), "atrim=end=6");
    }

    #[test]
    fn playback_rate_change_pairs_asetrate_with_resample() {
        let mut s = sound("a.wav");
        s.playback_rate = 1.25;

        let graph = build_audio_graph(&[s], 48000).unwrap();
        let rendered: Vec<String> = graph.chains[0].ops.iter().map(FilterOp::render).collect();
        assert_eq!(rendered, vec!["aresample=48000", "asetrate=60000", "aresample=48000"]);
    }

    #[test]
    fn mix_stage_takes_all_labels_without_normalization() {
        let sounds = vec![sound("a.wav"), sound("b.wav"), sound("c.wav")];
        let graph = build_audio_graph(&sounds, 44100).unwrap();

        let mix = graph.mix.as_ref().unwrap();
        assert_eq!(mix.inputs, vec!["snd0", "snd1", "snd2"]);
        assert_eq!(
            mix.ops[0].render(),
            "amix=inputs=3:dropout_transition=0:normalize=0"
        );
        assert_eq!(graph.output_label(), Some("mix"));
    }

    #[test]
    fn example_chain_resample_volume_delay() {
        // fps=30, one sound {offset: 0.5, gain: -6, rate: 1}, 48 kHz.
        let mut s = sound("voice.wav");
        s.offset = 0.5;
        s.gain = Some(-6.0);

        let graph = build_audio_graph(&[s], 48000).unwrap();
        let rendered: Vec<String> = graph.chains[0].ops.iter().map(FilterOp::render).collect();
        assert_eq!(
            rendered,
            vec!["aresample=48000", "volume=-6dB", "adelay=delays=500:all=1"]
        );
        assert_eq!(
            graph.mix.as_ref().unwrap().ops[0].render(),
            "amix=inputs=1:dropout_transition=0:normalize=0"
        );
    }

    #[test]
    fn zero_gain_emits_no_volume_filter() {
        let mut s = sound("a.wav");
        s.gain = Some(0.0);

        let graph = build_audio_graph(&[s], 48000).unwrap();
        assert!(graph.chains[0].ops.iter().all(|op| op.name != "volume"));
    }

    #[test]
    fn filter_complex_joins_chains_and_mix() {
        let mut a = sound("a.wav");
        a.offset = 0.25;
        let b = sound("b.wav");

        let graph = build_audio_graph(&[a, b], 48000).unwrap();
        assert_eq!(
            graph.filter_complex().unwrap(),
            "[1:a]aresample=48000,adelay=delays=250:all=1[snd0];\
             [2:a]aresample=48000[snd1];\
             [snd0][snd1]amix=inputs=2:dropout_transition=0:normalize=0[mix]"
        );
    }

    #[test]
    fn non_positive_playback_rate_is_rejected() {
        let mut s = sound("a.wav");
        s.playback_rate = -1.0;
        assert!(build_audio_graph(&[s], 48000).is_err());
        assert!(build_audio_graph(&[sound("a.wav")], 0).is_err());
    }

    #[test]
    fn param_escaping_covers_option_delimiters() {
        assert_eq!(escape_param("48000"), "48000");
        assert_eq!(escape_param("a:b"), "a\\:b");
        assert_eq!(escape_param("x,y"), "x\\,y");
    }

    proptest! {
        #[test]
        fn rate_change_is_always_followed_by_target_resample(
            rate in 0.05f64..8.0,
        ) {
            prop_assume!((rate - 1.0).abs() > 1e-9);
            let mut s = sound("a.wav");
            s.playback_rate = rate;

            let graph = build_audio_graph(&[s], 48000).unwrap();
            let ops = &graph.chains[0].ops;
            let pos = ops.iter().position(|op| op.name == "asetrate").unwrap();
            let expected = (48000f64 * rate).round() as u64;
            prop_assert_eq!(ops[pos].render(), format!("asetrate={expected}"));
            prop_assert_eq!(ops[pos + 1].render(), "aresample=48000".to_string());
        }

        #[test]
        fn negative_offsets_always_request_the_scaled_seek(
            offset in -30.0f64..-0.001,
            start in 0.0f64..10.0,
            rate in 0.1f64..4.0,
        ) {
            let mut s = sound("a.wav");
            s.offset = offset;
            s.start = Some(start);
            s.playback_rate = rate;

            let graph = build_audio_graph(&[s], 48000).unwrap();
            let expected = start - offset * rate;
            let seek = graph.inputs[0].seek.unwrap();
            prop_assert!((seek - expected).abs() < 1e-9);
        }

        #[test]
        fn mix_arity_always_matches_sound_count(n in 1usize..8) {
            let sounds: Vec<Sound> = (0..n)
                .map(|i| sound(&format!("s{i}.wav")))
                .collect();
            let graph = build_audio_graph(&sounds, 48000).unwrap();
            let mix = graph.mix.unwrap();
            prop_assert_eq!(mix.inputs.len(), n);
            prop_assert_eq!(
                mix.ops[0].render(),
                format!("amix=inputs={n}:dropout_transition=0:normalize=0")
            );
        }
    }
}
