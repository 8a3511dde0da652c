//! Closed-form cycle estimate used when no predictor is loaded
//!
//! Ideal MAC throughput with no overheads: the operation count, reduced by
//! sparsity, divided by the MACs the device retires per cycle.

use super::workload::{Operation, VpuDevice, Workload};

/// Devices from this generation pad input channels up to 16 for convolutions
const CHANNEL_PADDING_FROM: VpuDevice = VpuDevice::Vpu2_7;
const MIN_PADDED_CHANNELS: u64 = 16;

/// Multiply-accumulate operations of the workload, ignoring sparsity
pub fn ideal_operations(workload: &Workload) -> u64 {
    // oversized workloads clamp to u64::MAX
    let kernel = (workload.kernel[0] as u64).saturating_mul(workload.kernel[1] as u64);
    let output = workload.output.volume();

    match workload.operation {
        Operation::Convolution | Operation::CmConvolution => {
            let mut in_channels = workload.input.channels as u64;
            if workload.device >= CHANNEL_PADDING_FROM && in_channels < MIN_PADDED_CHANNELS {
                in_channels = MIN_PADDED_CHANNELS;
            }
            kernel.saturating_mul(output).saturating_mul(in_channels)
        }
        Operation::Eltwise => workload.input.volume(),
        Operation::DwConvolution | Operation::MaxPool | Operation::AvePool => kernel.saturating_mul(output),
    }
}

/// Fraction of operations left after the most effective enabled sparsity
pub fn sparsity_density(workload: &Workload) -> f64 {
    let density = |sparsity: f32| (1.0 - sparsity as f64).clamp(0.0, 1.0);

    let mut factor: f64 = 1.0;
    if workload.input.sparsity_enabled {
        factor = factor.min(density(workload.act_sparsity));
    }
    if workload.weight_sparsity_enabled {
        factor = factor.min(density(workload.weight_sparsity));
    }
    factor
}

/// MACs retired per cycle for the workload's compute type
pub fn effective_mac_count(workload: &Workload) -> u64 {
    let macs = workload.device.mac_count();
    if workload.input.dtype.is_float() {
        (macs / workload.device.fp_ratio()).max(1)
    } else {
        macs
    }
}

/// Ideal cycle count; never fails, zero for an empty output
pub fn analytical_cycles(workload: &Workload) -> u32 {
    if workload.output.volume() == 0 {
        return 0;
    }

    // float to int `as` saturates at u64::MAX
    let operations = (ideal_operations(workload) as f64 * sparsity_density(workload)).ceil() as u64;
    let cycles = operations.div_ceil(effective_mac_count(workload));
    u32::try_from(cycles).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::workload::{DataType, Tensor};

    fn workload(device: VpuDevice, operation: Operation, in_channels: u32, dtype: DataType) -> Workload {
        Workload::new(
            device,
            operation,
            Tensor::new(16, 16, in_channels, 1, dtype),
            Tensor::new(16, 16, 64, 1, dtype),
        )
        .with_kernel(3, 3)
    }

    #[test]
    fn test_convolution_cycles() {
        // 9 * 16384 * 64 / 2048
        let wl = workload(VpuDevice::Vpu2_7, Operation::Convolution, 64, DataType::Uint8);
        assert_eq!(analytical_cycles(&wl), 4608);

        // float halves throughput on 2.7
        let wl = workload(VpuDevice::Vpu2_7, Operation::Convolution, 64, DataType::Float16);
        assert_eq!(analytical_cycles(&wl), 9216);
    }

    #[test]
    fn test_channel_padding_depends_on_generation() {
        let new = workload(VpuDevice::Vpu4_0, Operation::CmConvolution, 3, DataType::Uint8);
        assert_eq!(ideal_operations(&new), 9 * 16384 * 16);

        let old = workload(VpuDevice::Vpu2_0, Operation::CmConvolution, 3, DataType::Uint8);
        assert_eq!(ideal_operations(&old), 9 * 16384 * 3);
    }

    #[test]
    fn test_eltwise_and_pooling() {
        let elt = workload(VpuDevice::Npu5_0, Operation::Eltwise, 64, DataType::Uint8);
        assert_eq!(ideal_operations(&elt), 16 * 16 * 64);
        assert_eq!(analytical_cycles(&elt), 4);

        let pool = workload(VpuDevice::Vpu2_1, Operation::MaxPool, 64, DataType::Uint8);
        assert_eq!(ideal_operations(&pool), 9 * 16384);
        assert_eq!(analytical_cycles(&pool), 576);
    }

    #[test]
    fn test_sparsity_uses_the_smaller_density() {
        let base = workload(VpuDevice::Vpu2_7, Operation::Convolution, 64, DataType::Uint8);
        assert_eq!(sparsity_density(&base), 1.0);

        let dual = base.clone().with_input_sparsity(0.25).with_weight_sparsity(0.5);
        assert!((sparsity_density(&dual) - 0.5).abs() < 1e-9);
        assert_eq!(analytical_cycles(&dual), 2304);

        let over = base.with_weight_sparsity(1.5);
        assert_eq!(sparsity_density(&over), 0.0);
    }

    #[test]
    fn test_oversized_workload_saturates() {
        let huge = Tensor::new(65536, 65536, 65536, 1, DataType::Uint8);
        let wl = Workload::new(VpuDevice::Vpu2_7, Operation::Convolution, huge, huge).with_kernel(11, 11);
        assert_eq!(wl.output.volume(), 1u64 << 48);
        assert_eq!(ideal_operations(&wl), u64::MAX);
        assert_eq!(analytical_cycles(&wl), u32::MAX);

        let max = Tensor::new(u32::MAX, u32::MAX, u32::MAX, u32::MAX, DataType::Float16);
        assert_eq!(max.volume(), u64::MAX);
        let pool = Workload::new(VpuDevice::Vpu2_0, Operation::MaxPool, max, max);
        assert_eq!(analytical_cycles(&pool), u32::MAX);
    }

    #[test]
    fn test_empty_output_is_zero() {
        let mut wl = workload(VpuDevice::Vpu2_7, Operation::Convolution, 64, DataType::Uint8);
        wl.output.width = 0;
        assert_eq!(analytical_cycles(&wl), 0);
    }
}
