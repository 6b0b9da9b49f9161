use crate::types::{AudioBuffer, SampleI16};
use anyhow::{bail, Result};

/// トーン合成パラメータ
///
/// 周波数はHz、振幅はフルスケールに対する割合 (0, 1]。
/// プロセス内書き換えでは周囲の未墨消し音声に対して
/// クリップしないよう低め、単独のオーバーレイトラックでは
/// 単体でも聞き取れるよう高めの振幅を使うのが通例。
#[derive(Clone, Copy, Debug)]
pub struct ToneParams {
    /// トーンの周波数 (Hz)
    pub frequency_hz: f64,

    /// 振幅 (フルスケール比、(0, 1])
    pub amplitude: f64,
}

impl ToneParams {
    /// パラメータを検証して生成
    ///
    /// # Errors
    ///
    /// 周波数が0以下、または振幅が (0, 1] の範囲外の場合にエラーを返す。
    pub fn new(frequency_hz: f64, amplitude: f64) -> Result<Self> {
        if frequency_hz <= 0.0 {
            bail!("トーン周波数は正の値が必要です: {}", frequency_hz);
        }
        if amplitude <= 0.0 || amplitude > 1.0 {
            bail!("トーン振幅は (0, 1] の範囲が必要です: {}", amplitude);
        }
        Ok(Self {
            frequency_hz,
            amplitude,
        })
    }
}

/// 指定した長さのトーンを合成
///
/// 全チャンネル同一の純粋な正弦波を生成する。
/// サンプル数は `ceil(duration * sample_rate)`。
/// 同じ入力に対して常にビット単位で同一の出力を返す
/// (再現可能なテストのための決定性)。
///
/// # Examples
///
/// ```
/// # use dcr_redact::tone::{synthesize, ToneParams};
/// let params = ToneParams::new(1000.0, 0.4).unwrap();
/// let buf = synthesize(0.5, 16000, 1, &params);
/// assert_eq!(buf.num_samples(), 8000);
/// ```
pub fn synthesize(
    duration_secs: f64,
    sample_rate: u32,
    channels: u16,
    params: &ToneParams,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f64).ceil() as usize;
    synthesize_samples(num_samples, sample_rate, channels, params)
}

/// 正確なサンプル数を指定してトーンを合成
///
/// サンプル書き換えでは区間のサンプル数が先に決まっているため、
/// 秒数ではなくサンプル数で合成する入口を用意している。
/// 位相はサンプル0から始まる (区間毎の位相リセットは
/// 呼び出し側が区間先頭でこの関数を呼ぶことで実現される)。
pub fn synthesize_samples(
    num_samples: usize,
    sample_rate: u32,
    channels: u16,
    params: &ToneParams,
) -> AudioBuffer {
    let mono: Vec<SampleI16> = (0..num_samples)
        .map(|n| {
            let t = n as f64 / sample_rate as f64;
            let value = params.amplitude * (2.0 * std::f64::consts::PI * params.frequency_hz * t).sin();
            (value * SampleI16::MAX as f64) as SampleI16
        })
        .collect();

    AudioBuffer {
        sample_rate,
        channels: vec![mono; channels as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(ToneParams::new(1000.0, 0.4).is_ok());
        assert!(ToneParams::new(1000.0, 1.0).is_ok());
        assert!(ToneParams::new(0.0, 0.4).is_err());
        assert!(ToneParams::new(-100.0, 0.4).is_err());
        assert!(ToneParams::new(1000.0, 0.0).is_err());
        assert!(ToneParams::new(1000.0, 1.5).is_err());
    }

    #[test]
    fn test_sample_count_is_ceiling() {
        let params = ToneParams::new(1000.0, 0.5).unwrap();

        let buf = synthesize(1.0, 16000, 1, &params);
        assert_eq!(buf.num_samples(), 16000);

        // 端数は切り上げ
        let buf = synthesize(0.1001, 16000, 1, &params);
        assert_eq!(buf.num_samples(), 1602);

        let buf = synthesize(0.0, 16000, 1, &params);
        assert_eq!(buf.num_samples(), 0);
    }

    #[test]
    fn test_determinism() {
        let params = ToneParams::new(1000.0, 0.4).unwrap();
        let a = synthesize(0.5, 44100, 2, &params);
        let b = synthesize(0.5, 44100, 2, &params);

        // ビット単位で同一
        assert_eq!(a, b);
    }

    #[test]
    fn test_channels_identical() {
        let params = ToneParams::new(440.0, 0.8).unwrap();
        let buf = synthesize(0.25, 44100, 2, &params);

        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.channels[0], buf.channels[1]);
    }

    #[test]
    fn test_amplitude_bound() {
        let params = ToneParams::new(1000.0, 0.5).unwrap();
        let buf = synthesize(1.0, 16000, 1, &params);

        let limit = (0.5 * SampleI16::MAX as f64) as SampleI16;
        assert!(buf.channels[0].iter().all(|&s| s.abs() <= limit));
        // 無音ではない
        assert!(buf.channels[0].iter().any(|&s| s != 0));
    }

    #[test]
    fn test_phase_starts_at_zero() {
        let params = ToneParams::new(1000.0, 0.5).unwrap();
        let buf = synthesize_samples(100, 16000, 1, &params);

        // sin(0) = 0 なので先頭サンプルは0
        assert_eq!(buf.channels[0][0], 0);
        // 直後は正方向に立ち上がる
        assert!(buf.channels[0][1] > 0);
    }
}
