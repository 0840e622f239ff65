//! NPU 테스트벤치용 테스트 벡터 생성
//!
//! f16 FFT 버터플라이를 돌리고 가중치를 하드웨어 레이아웃으로 바꾼 뒤,
//! 레이어 정규화와 shortcut 덧셈까지 계산해서 한 줄에 값 하나씩 텍스트로
//! 덤프한다. 단계별 활성값과 가중치는 실수부/허수부를 따로 쓴다.

use crate::config::constants::Constants;
use crate::config::ButterflyConfig;
use crate::error::{config, shape, Result};
use crate::layers::ButterflyLinear;
use crate::precision::{stage_deviation, ButterflyScalar, Precision, SplitComplex};
use half::f16;
use ndarray::{Array1, Array2, Array3, Axis};
use num::{Complex, Float};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// 마지막 축 기준 레이어 정규화 (affine 없음)
pub fn layer_norm(x: &Array1<f32>, eps: f32) -> Array1<f32> {
    let n = x.len().max(1) as f32;
    let mean = x.sum() / n;
    let var = x.mapv(|v| (v - mean) * (v - mean)).sum() / n;
    let denom = (var + eps).sqrt();
    x.mapv(|v| (v - mean) / denom)
}

/// 테스트벤치 한 벌
#[derive(Debug, Clone)]
pub struct TestVectorSet {
    /// 입력 시퀀스
    pub input: Array1<f32>,
    /// FFT 출력의 실수부
    pub output_fft: Array1<f32>,
    /// 레이어 정규화 결과
    pub output_ln: Array1<f32>,
    /// 정규화 결과 + 입력
    pub output_sc: Array1<f32>,
    /// 단계별 활성값 (n)
    pub stages: Vec<Array1<Complex<f32>>>,
    /// 하드웨어 레이아웃 가중치 (rows / BU, 4 * BU)
    pub weights: Vec<Array2<Complex<f32>>>,
    /// f64 레퍼런스 대비 단계별 최대 오차
    pub deviation: Vec<f64>,
}

impl TestVectorSet {
    /// 설정과 입력으로 테스트 벡터 생성
    ///
    /// f16 모드에서는 입력도 f16으로 반올림해서 레퍼런스와 같은 값을 쓴다.
    pub fn generate(cfg: &ButterflyConfig, input: &Array1<f32>) -> Result<Self> {
        cfg.validate()?;
        if cfg.nblocks != 1 || cfg.increasing_stride {
            return Err(config(
                "test vectors use a single decreasing-stride FFT block",
            ));
        }
        if input.len() != cfg.n {
            return Err(shape(format!(
                "input length {} does not match n = {}",
                input.len(),
                cfg.n
            )));
        }

        let input = match cfg.precision {
            Precision::Half => input.mapv(|v| f16::from_f32(v).to_f32()),
            Precision::Single => input.clone(),
        };

        let run = match cfg.precision {
            Precision::Half => run_fft::<f16>(cfg, &input)?,
            Precision::Single => run_fft::<f32>(cfg, &input)?,
        };
        let reference = run_fft::<f64>(cfg, &input)?;
        let deviation = stage_deviation(&run.activations, &reference.activations)?;
        let worst = deviation.iter().cloned().fold(0.0, f64::max);
        info!(
            n = cfg.n,
            precision = ?cfg.precision,
            worst,
            "stage deviation against f64 reference"
        );

        let output_fft = squeeze(&run.output).mapv(|z| z.re);
        let output_ln = layer_norm(&output_fft, Constants::LAYER_NORM_EPS);
        let output_sc = &output_ln + &input;

        Ok(TestVectorSet {
            input,
            output_fft,
            output_ln,
            output_sc,
            stages: run.activations.iter().map(squeeze).collect(),
            weights: run
                .weights
                .iter()
                .map(|w| w.index_axis(Axis(0), 0).to_owned())
                .collect(),
            deviation,
        })
    }

    /// `dir` 아래에 모든 파일을 쓴다
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_column(&dir.join("input_fft.txt"), self.input.iter().map(|&v| v as f64))?;
        write_column(&dir.join("output_fft.txt"), self.output_fft.iter().map(|&v| v as f64))?;
        write_column(&dir.join("output_ln.txt"), self.output_ln.iter().map(|&v| v as f64))?;
        write_column(&dir.join("output_sc.txt"), self.output_sc.iter().map(|&v| v as f64))?;
        for (i, stage) in self.stages.iter().enumerate() {
            write_column(
                &dir.join(format!("data_stage{}_real.txt", i)),
                stage.iter().map(SplitComplex::re),
            )?;
            write_column(
                &dir.join(format!("data_stage{}_image.txt", i)),
                stage.iter().map(SplitComplex::im),
            )?;
        }
        for (i, weight) in self.weights.iter().enumerate() {
            write_column(
                &dir.join(format!("weight{}_real.txt", i)),
                weight.iter().map(SplitComplex::re),
            )?;
            write_column(
                &dir.join(format!("weight{}_image.txt", i)),
                weight.iter().map(SplitComplex::im),
            )?;
        }
        info!(dir = %dir.display(), stages = self.stages.len(), "test vectors written");
        Ok(())
    }
}

/// 한 정밀도에서 돌린 결과를 f32 복소수로 넓힌 것
struct FftRun {
    output: Array3<Complex<f32>>,
    activations: Vec<Array3<Complex<f32>>>,
    /// 하드웨어 레이아웃으로 바꾼 가중치
    weights: Vec<Array3<Complex<f32>>>,
}

fn run_fft<F: Float + ButterflyScalar + SplitComplex>(
    cfg: &ButterflyConfig,
    input: &Array1<f32>,
) -> Result<FftRun> {
    let layer = ButterflyLinear::<Complex<F>>::fft(*cfg)?;
    let x = input
        .mapv(|v| Complex::new(F::from(v).unwrap_or_else(F::nan), F::zero()))
        .insert_axis(Axis(0))
        .insert_axis(Axis(0));
    let trace = layer.forward(&x)?;
    let output = widen(&trace.output);
    let activations = trace.activations.iter().map(widen).collect();
    let weights = layer.export_weights(trace.into_weights())?;
    Ok(FftRun {
        output,
        activations,
        weights: weights.iter().map(widen).collect(),
    })
}

fn widen<F: SplitComplex>(a: &Array3<Complex<F>>) -> Array3<Complex<f32>> {
    a.map(|z| Complex::new(z.re() as f32, z.im() as f32))
}

/// (1, 1, n) → (n)
fn squeeze(a: &Array3<Complex<f32>>) -> Array1<Complex<f32>> {
    a.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned()
}

/// 한 줄에 f16 값 하나
fn write_column<I: IntoIterator<Item = f64>>(path: &Path, values: I) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(out, "{}", f16::from_f64(v))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_input(n: usize, seed: u64) -> Array1<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array1::from_shape_fn(n, |_| rng.gen::<f32>())
    }

    #[test]
    fn layer_norm_has_zero_mean_unit_variance() {
        let x = Array1::from(vec![1.0f32, 2.0, 3.0, 4.0]);
        let y = layer_norm(&x, 0.0);
        assert_abs_diff_eq!(y.sum(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y.mapv(|v| v * v).sum() / 4.0, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn generate_shapes_follow_layout() {
        let cfg = ButterflyConfig::new(128);
        let set = TestVectorSet::generate(&cfg, &random_input(128, 1)).unwrap();
        assert_eq!(set.stages.len(), 7);
        assert_eq!(set.weights.len(), 7);
        for w in &set.weights {
            assert_eq!(w.shape(), &[16, 16]);
        }
        assert_eq!(set.output_sc.len(), 128);
        assert_abs_diff_eq!(set.output_sc[5] - set.output_ln[5], set.input[5], epsilon = 1e-5);
    }

    #[test]
    fn half_precision_tracks_reference() {
        let cfg = ButterflyConfig::new(64).with_bu_parallelism(2);
        let set = TestVectorSet::generate(&cfg, &random_input(64, 2)).unwrap();
        // 값의 크기가 n 정도까지 커지므로 절대 오차도 그만큼 허용
        for d in &set.deviation {
            assert!(*d < 64.0 * Constants::HALF_TOLERANCE, "deviation {}", d);
        }
        let single = TestVectorSet::generate(
            &cfg.with_precision(Precision::Single),
            &set.input,
        )
        .unwrap();
        for d in &single.deviation {
            assert!(*d < 64.0 * Constants::SINGLE_TOLERANCE, "deviation {}", d);
        }
    }

    #[test]
    fn dc_component_is_input_sum() {
        let cfg = ButterflyConfig::new(16).with_precision(Precision::Single);
        let input = Array1::from_shape_fn(16, |i| i as f32 * 0.25);
        let set = TestVectorSet::generate(&cfg, &input).unwrap();
        // DIF 출력의 0번은 비트 반전해도 0번
        assert_abs_diff_eq!(set.output_fft[0], input.sum(), epsilon = 1e-4);
    }

    #[test]
    fn write_emits_one_value_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ButterflyConfig::new(16).with_bu_parallelism(2);
        let set = TestVectorSet::generate(&cfg, &random_input(16, 3)).unwrap();
        set.write(dir.path()).unwrap();

        let text = fs::read_to_string(dir.path().join("input_fft.txt")).unwrap();
        assert_eq!(text.lines().count(), 16);
        let first: f32 = text.lines().next().unwrap().parse().unwrap();
        assert_abs_diff_eq!(first, set.input[0], epsilon = 1e-3);

        for i in 0..4 {
            let stage = fs::read_to_string(dir.path().join(format!("data_stage{}_image.txt", i)))
                .unwrap();
            assert_eq!(stage.lines().count(), 16);
            let weight = fs::read_to_string(dir.path().join(format!("weight{}_real.txt", i)))
                .unwrap();
            assert_eq!(weight.lines().count(), 32);
        }
        assert!(dir.path().join("output_sc.txt").exists());
    }

    #[test]
    fn rejects_wrong_input_length() {
        let cfg = ButterflyConfig::new(16).with_bu_parallelism(2);
        assert!(matches!(
            TestVectorSet::generate(&cfg, &random_input(8, 0)),
            Err(Error::Shape(_))
        ));
    }
}
