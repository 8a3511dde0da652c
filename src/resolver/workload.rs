//! Workload description consumed by the resolver
//!
//! A workload is one DPU operation on one device. The resolver only needs a
//! few things from it: the device generation (to pick the cache key policy),
//! the two sparsity flags (to detect dual-condition requests) and a canonical
//! flattening of its fields (the workload fingerprint).

use serde::{Deserialize, Serialize};

use crate::cache::traits::{Fingerprint, FingerprintContext, Fingerprintable};

/// Floats produced by [`Workload::canonical_fields`]
pub const WORKLOAD_KEY_LENGTH: usize = 43;

/// Push a `u32` as its high and low 16-bit halves, both exact in an `f32`
#[inline]
fn push_exact(out: &mut Vec<f32>, value: u32) {
    out.push((value >> 16) as f32);
    out.push((value & 0xffff) as f32);
}

/// Device generation, ordered oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VpuDevice {
    Vpu2_0,
    Vpu2_1,
    Vpu2_7,
    Vpu4_0,
    Npu5_0,
}

impl VpuDevice {
    /// MAC units available per cycle for integer compute
    pub const fn mac_count(self) -> u64 {
        match self {
            VpuDevice::Vpu2_0 | VpuDevice::Vpu2_1 => 256,
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => 2048,
            VpuDevice::Npu5_0 => 4096,
        }
    }

    /// Integer to float throughput ratio
    pub const fn fp_ratio(self) -> u64 {
        match self {
            VpuDevice::Vpu2_0 | VpuDevice::Vpu2_1 => 4,
            _ => 2,
        }
    }

    fn ordinal(self) -> f32 {
        self as u8 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Convolution,
    CmConvolution,
    DwConvolution,
    Eltwise,
    MaxPool,
    AvePool,
}

impl Operation {
    fn ordinal(self) -> f32 {
        self as u8 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Uint8,
    Int8,
    Float16,
    Bfloat16,
}

impl DataType {
    pub const fn is_float(self) -> bool {
        matches!(self, DataType::Float16 | DataType::Bfloat16)
    }

    fn ordinal(self) -> f32 {
        self as u8 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub batch: u32,
    pub dtype: DataType,
    pub sparsity_enabled: bool,
}

impl Tensor {
    pub fn new(width: u32, height: u32, channels: u32, batch: u32, dtype: DataType) -> Self {
        Self {
            width,
            height,
            channels,
            batch,
            dtype,
            sparsity_enabled: false,
        }
    }

    /// Element count, saturating at `u64::MAX`
    pub fn volume(&self) -> u64 {
        [self.height, self.channels, self.batch]
            .iter()
            .fold(self.width as u64, |acc, &dim| acc.saturating_mul(dim as u64))
    }

    fn push_fields(&self, out: &mut Vec<f32>) {
        for dim in [self.width, self.height, self.channels, self.batch] {
            push_exact(out, dim);
        }
        out.push(self.dtype.ordinal());
        out.push(if self.sparsity_enabled { 1.0 } else { 0.0 });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub device: VpuDevice,
    pub operation: Operation,
    pub input: Tensor,
    pub output: Tensor,
    /// width, height
    pub kernel: [u32; 2],
    /// width, height
    pub stride: [u32; 2],
    /// top, bottom, left, right
    pub padding: [u32; 4],
    /// Fraction of zero activations, meaningful with input sparsity
    pub act_sparsity: f32,
    pub weight_sparsity_enabled: bool,
    pub weight_sparsity: f32,
    pub output_write_tiles: u32,
}

impl Workload {
    pub fn new(device: VpuDevice, operation: Operation, input: Tensor, output: Tensor) -> Self {
        Self {
            device,
            operation,
            input,
            output,
            kernel: [1, 1],
            stride: [1, 1],
            padding: [0; 4],
            act_sparsity: 0.0,
            weight_sparsity_enabled: false,
            weight_sparsity: 0.0,
            output_write_tiles: 1,
        }
    }

    pub fn with_kernel(mut self, width: u32, height: u32) -> Self {
        self.kernel = [width, height];
        self
    }

    pub fn with_stride(mut self, width: u32, height: u32) -> Self {
        self.stride = [width, height];
        self
    }

    pub fn with_padding(mut self, top: u32, bottom: u32, left: u32, right: u32) -> Self {
        self.padding = [top, bottom, left, right];
        self
    }

    pub fn with_input_sparsity(mut self, act_sparsity: f32) -> Self {
        self.input.sparsity_enabled = true;
        self.act_sparsity = act_sparsity;
        self
    }

    pub fn with_weight_sparsity(mut self, weight_sparsity: f32) -> Self {
        self.weight_sparsity_enabled = true;
        self.weight_sparsity = weight_sparsity;
        self
    }

    pub fn with_output_write_tiles(mut self, tiles: u32) -> Self {
        self.output_write_tiles = tiles;
        self
    }

    /// Newer generations are keyed by their own fields, older ones by the
    /// encoded descriptor
    #[inline]
    pub fn uses_workload_fingerprint(&self) -> bool {
        self.device >= VpuDevice::Npu5_0
    }

    /// Input and weight sparsity both enabled, a mix the predictor never saw
    #[inline]
    pub fn is_dual_condition(&self) -> bool {
        self.input.sparsity_enabled && self.weight_sparsity_enabled
    }

    /// Clone with input sparsity off and clone with weight sparsity off
    pub fn split_dual(&self) -> (Workload, Workload) {
        let mut without_input = self.clone();
        without_input.input.sparsity_enabled = false;
        without_input.act_sparsity = 0.0;

        let mut without_weights = self.clone();
        without_weights.weight_sparsity_enabled = false;
        without_weights.weight_sparsity = 0.0;

        (without_input, without_weights)
    }

    /// Fixed-order flattening used as the workload cache key
    pub fn canonical_fields(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(WORKLOAD_KEY_LENGTH);
        out.push(self.device.ordinal());
        out.push(self.operation.ordinal());
        self.input.push_fields(&mut out);
        self.output.push_fields(&mut out);
        for &value in self.kernel.iter().chain(&self.stride).chain(&self.padding) {
            push_exact(&mut out, value);
        }
        out.push(self.act_sparsity);
        out.push(if self.weight_sparsity_enabled { 1.0 } else { 0.0 });
        out.push(self.weight_sparsity);
        push_exact(&mut out, self.output_write_tiles);
        out
    }
}

impl Fingerprintable for Workload {
    fn fingerprint(&self, context: &FingerprintContext) -> Fingerprint {
        context.hash_floats(&self.canonical_fields())
    }
}
