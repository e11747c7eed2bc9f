//! End-to-end tests for the morphing filter engine.


use zplane_dsp::biquad::SectionCoefficients;
use zplane_dsp::engine::ZPlaneEngine;
use zplane_dsp::guard;
use zplane_dsp::morph::{self, PolePair};
use zplane_dsp::pack::ModelPack;
use zplane_dsp::params::SharedParameters;
use zplane_dsp::remap::remap_pole;
use zplane_dsp::resources::{MORPH_PAIR_TABLE, SHAPE_TABLE};
use zplane_dsp::utils::random::Lcg;
use zplane_dsp::{NUM_SECTIONS, REFERENCE_SAMPLE_RATE};

const BLOCK_SIZE: usize = 64;

fn process_mono(engine: &mut ZPlaneEngine, params: &SharedParameters, input: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(input.len());
    for block in input.chunks(BLOCK_SIZE) {
        let mut buffer = block.to_vec();
        engine.process(&params.snapshot(), &mut [&mut buffer[..]]);
        out.extend_from_slice(&buffer);
    }
    out
}

fn sine(frequency: f32, sample_rate: f32, length: usize) -> Vec<f32> {
    (0..length)
        .map(|n| (2.0 * std::f32::consts::PI * frequency * n as f32 / sample_rate).sin() * 0.5)
        .collect()
}

#[test]
fn transparency_at_neutral_settings() {
    for morph in [0.0, 0.33, 0.8, 1.0] {
        let mut engine = ZPlaneEngine::new();
        engine.prepare(48000.0, BLOCK_SIZE, 1);

        let params = SharedParameters::new();
        params.set_morph(morph);
        // Intensity, drive and saturation stay at their neutral defaults.

        let input = sine(440.0, 48000.0, 4096);
        let output = process_mono(&mut engine, &params, &input);
        for (x, y) in input.iter().zip(output.iter()) {
            assert!((x - y).abs() < 1e-5, "not transparent at morph {morph}");
        }
    }
}

#[test]
fn stability_invariant_across_sample_rates() {
    for rate in [44100.0, 48000.0, 96000.0, 192000.0] {
        for (pair_id, pair) in MORPH_PAIR_TABLE.iter().enumerate() {
            for morph_step in 0..=10 {
                for intensity_step in 0..=4 {
                    let morph = morph_step as f32 / 10.0;
                    let intensity = intensity_step as f32 / 4.0;
                    let poles = morph::interpolate(
                        SHAPE_TABLE[pair.a],
                        SHAPE_TABLE[pair.b],
                        morph,
                        intensity,
                    );
                    for pole in poles {
                        let mapped = remap_pole(pole, rate);
                        assert!(
                            mapped.radius > 0.0 && mapped.radius < 1.0,
                            "pair {pair_id}, morph {morph}, intensity {intensity} \
                             at {rate} Hz left the unit disk"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn passivity_holds_for_randomized_draws() {
    let mut rng = Lcg::new(0x5eed);
    for _ in 0..1000 {
        let morph = rng.next_float();
        let intensity = rng.next_float();
        let pair = MORPH_PAIR_TABLE[(rng.next_word() as usize) % MORPH_PAIR_TABLE.len()];

        let poles =
            morph::interpolate(SHAPE_TABLE[pair.a], SHAPE_TABLE[pair.b], morph, intensity);
        let mut sections: [SectionCoefficients; NUM_SECTIONS] = core::array::from_fn(|i| {
            SectionCoefficients::from_pole(remap_pole(poles[i], REFERENCE_SAMPLE_RATE))
        });
        guard::apply(&mut sections);
        assert!(
            guard::peak_gain(&sections) <= guard::GAIN_CEILING + 1e-3,
            "passivity violated at morph {morph}, intensity {intensity}"
        );
    }
}

#[test]
fn reset_is_idempotent() {
    let params = SharedParameters::new();
    params.set_morph(0.4);
    params.set_intensity(0.9);
    params.set_saturation(0.3);

    let input = sine(220.0, 48000.0, 2048);

    let run = |resets: usize, reprepare: bool| -> Vec<u32> {
        let mut engine = ZPlaneEngine::new();
        engine.prepare(48000.0, BLOCK_SIZE, 1);
        // Establish some history before the reset under test.
        let _ = process_mono(&mut engine, &params, &input);
        for _ in 0..resets {
            engine.reset();
        }
        if reprepare {
            engine.prepare(48000.0, BLOCK_SIZE, 1);
        }
        process_mono(&mut engine, &params, &input)
            .iter()
            .map(|x| x.to_bits())
            .collect()
    };

    let single = run(1, false);
    let double = run(2, false);
    let reprepared = run(1, true);
    assert_eq!(single, double);
    assert_eq!(single, reprepared);
}

#[test]
fn impulse_decays_with_the_slowest_pole() {
    let mut engine = ZPlaneEngine::new();
    engine.prepare(48000.0, BLOCK_SIZE, 1);

    let params = SharedParameters::new();
    params.set_morph(0.5);
    params.set_morph_pair(0);
    params.set_intensity(0.5);
    params.set_drive_db(0.0);

    // First block separately: the coefficients active while the impulse
    // enters are the ones to check the initial response against.
    let mut first_block = vec![0.0f32; BLOCK_SIZE];
    first_block[0] = 1.0;
    engine.process(&params.snapshot(), &mut [&mut first_block[..]]);

    // The first sample is the cascade's initial response: the product of the
    // section b0 gains, computable from the published coefficients.
    let coefficients = engine.coefficients(0).unwrap();
    let expected: f32 = coefficients.iter().map(|c| c.b0).product();
    assert!(
        (first_block[0] - expected).abs() <= expected.abs() * 1e-4 + 1e-12,
        "first sample {} != cascade b0 product {}",
        first_block[0],
        expected
    );

    let tail = process_mono(&mut engine, &params, &vec![0.0f32; 48000 - BLOCK_SIZE]);
    let mut output = first_block;
    output.extend_from_slice(&tail);

    // Decay bound from the slowest pole's time constant.
    let slowest = engine
        .poles()
        .iter()
        .map(|p| p.radius)
        .fold(0.0f32, f32::max);
    let tau = -1.0 / slowest.ln();
    let settle = (tau * 40.0) as usize + 4 * BLOCK_SIZE;
    for (n, sample) in output.iter().enumerate().skip(settle) {
        assert!(
            sample.abs() < 1e-6,
            "sample {n} = {sample} has not decayed (tau = {tau})"
        );
    }
}

#[test]
fn loaded_pack_replaces_the_bank() {
    // Build a four-frame model from known poles at the reference rate.
    let mut frames = Vec::new();
    for frame in 0..4 {
        for section in 0..NUM_SECTIONS {
            let pole = PolePair::new(
                0.90 + 0.01 * frame as f32,
                0.2 + 0.05 * section as f32,
            );
            frames.push(SectionCoefficients::from_pole(pole));
        }
    }
    let pack = ModelPack::from_frames(3, NUM_SECTIONS, 48000.0, &frames).unwrap();

    // Wire round trip before installing.
    let reloaded = ModelPack::from_bytes(&pack.to_bytes()).unwrap();
    assert_eq!(reloaded.num_frames(), 4);
    assert_eq!(reloaded.num_sections(), NUM_SECTIONS);
    for section in 0..NUM_SECTIONS {
        assert_eq!(
            reloaded.coefficients(0.0, section),
            pack.frame(0, section)
        );
    }

    let mut engine = ZPlaneEngine::new();
    engine.prepare(48000.0, BLOCK_SIZE, 1);
    engine.install_pack(reloaded).unwrap();

    let params = SharedParameters::new();
    params.set_morph(0.0);
    params.set_intensity(1.0);

    let input = sine(300.0, 48000.0, 2048);
    let output = process_mono(&mut engine, &params, &input);
    assert!(output.iter().all(|x| x.is_finite()));

    // At morph 0 and full intensity the engine reproduces frame 0's poles.
    let poles = engine.poles();
    for (section, pole) in poles.iter().enumerate() {
        assert!((pole.radius - 0.90).abs() < 1e-4);
        assert!((pole.angle - (0.2 + 0.05 * section as f32)).abs() < 1e-4);
    }

    // Dropping the pack falls back to the built-in bank.
    engine.clear_pack();
    let _ = process_mono(&mut engine, &params, &input);
    assert_ne!(engine.poles(), poles);
}

#[test]
fn output_stays_bounded_at_extreme_settings() {
    simple_logger::SimpleLogger::new().init().ok();

    for rate in [44100.0, 96000.0, 192000.0] {
        let mut engine = ZPlaneEngine::new();
        engine.prepare(rate, BLOCK_SIZE, 2);

        let params = SharedParameters::new();
        params.set_intensity(1.0);
        params.set_drive_db(24.0);
        params.set_saturation(1.0);
        params.set_lfo_rate(8.0);
        params.set_lfo_depth(1.0);
        params.set_auto_makeup(true);
        params.set_morph_pair(1);

        let mut rng = Lcg::new(0xbeef);
        let mut peak = 0.0f32;
        for _ in 0..((rate as usize) / BLOCK_SIZE) {
            let mut left: Vec<f32> =
                (0..BLOCK_SIZE).map(|_| rng.next_float() - 0.5).collect();
            let mut right = left.clone();
            engine.process(&params.snapshot(), &mut [&mut left[..], &mut right[..]]);
            for y in left.iter().chain(right.iter()) {
                assert!(y.is_finite());
                peak = peak.max(y.abs());
            }
        }
        log::info!("extreme-settings peak at {rate} Hz: {peak}");
        assert!(peak < 64.0, "runaway output {peak} at {rate} Hz");
    }
}

#[test]
fn morph_sweep_renders_audio() {
    let mut engine = ZPlaneEngine::new();
    engine.prepare(48000.0, BLOCK_SIZE, 1);

    let params = SharedParameters::new();
    params.set_intensity(1.0);
    params.set_morph_pair(1);

    // Two seconds of impulse excitation swept across the morph range.
    let mut rendered = Vec::new();
    let blocks = 2 * 48000 / BLOCK_SIZE;
    for n in 0..blocks {
        params.set_morph(n as f32 / blocks as f32);
        let mut buffer = [0.0f32; BLOCK_SIZE];
        if n % 25 == 0 {
            buffer[0] = 0.8;
        }
        engine.process(&params.snapshot(), &mut [&mut buffer[..]]);
        rendered.extend_from_slice(&buffer);
    }

    assert!(rendered.iter().any(|x| x.abs() > 1e-6));
    wav_writer::write("engine/morph_sweep.wav", 48000.0, &rendered).ok();
}
