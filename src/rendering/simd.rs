/// Portable 4-wide f32 vector for the pixel loop.
/// SSE on x86_64, a plain array everywhere else. Comparisons return a
/// 4-bit lane mask (bit i set when lane i passes).
use std::ops::{Add, Mul};

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
use core::arch::x86_64::{
    __m128, _mm_add_ps, _mm_cmpge_ps, _mm_cmpgt_ps, _mm_cmplt_ps, _mm_loadu_ps, _mm_movemask_ps,
    _mm_mul_ps, _mm_set1_ps, _mm_set_ps, _mm_storeu_ps,
};

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct F32x4(__m128);

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
#[derive(Copy, Clone)]
#[repr(C, align(16))]
pub struct F32x4([f32; 4]);

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
impl F32x4 {
    #[inline(always)]
    pub fn splat(v: f32) -> Self {
        unsafe { Self(_mm_set1_ps(v)) }
    }

    #[inline(always)]
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        unsafe { Self(_mm_set_ps(d, c, b, a)) }
    }

    /// Load four consecutive floats.
    ///
    /// # Safety
    /// `ptr` must be valid for reading four `f32`s.
    #[inline(always)]
    pub unsafe fn load(ptr: *const f32) -> Self {
        Self(_mm_loadu_ps(ptr))
    }

    #[inline(always)]
    pub fn to_array(self) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        unsafe { _mm_storeu_ps(out.as_mut_ptr(), self.0) };
        out
    }

    #[inline(always)]
    pub fn ge_mask(self, other: Self) -> u32 {
        unsafe { _mm_movemask_ps(_mm_cmpge_ps(self.0, other.0)) as u32 }
    }

    #[inline(always)]
    pub fn gt_mask(self, other: Self) -> u32 {
        unsafe { _mm_movemask_ps(_mm_cmpgt_ps(self.0, other.0)) as u32 }
    }

    #[inline(always)]
    pub fn lt_mask(self, other: Self) -> u32 {
        unsafe { _mm_movemask_ps(_mm_cmplt_ps(self.0, other.0)) as u32 }
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
impl Add for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        unsafe { Self(_mm_add_ps(self.0, rhs.0)) }
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
impl Mul for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        unsafe { Self(_mm_mul_ps(self.0, rhs.0)) }
    }
}

// Scalar fallback for non-x86_64 targets.
#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
impl F32x4 {
    #[inline(always)]
    pub fn splat(v: f32) -> Self {
        Self([v; 4])
    }

    #[inline(always)]
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self([a, b, c, d])
    }

    /// Load four consecutive floats.
    ///
    /// # Safety
    /// `ptr` must be valid for reading four `f32`s.
    #[inline(always)]
    pub unsafe fn load(ptr: *const f32) -> Self {
        Self([*ptr, *ptr.add(1), *ptr.add(2), *ptr.add(3)])
    }

    #[inline(always)]
    pub fn to_array(self) -> [f32; 4] {
        self.0
    }

    #[inline(always)]
    fn mask(self, other: Self, op: impl Fn(f32, f32) -> bool) -> u32 {
        (0..4).fold(0, |m, i| m | ((op(self.0[i], other.0[i]) as u32) << i))
    }

    #[inline(always)]
    pub fn ge_mask(self, other: Self) -> u32 {
        self.mask(other, |a, b| a >= b)
    }

    #[inline(always)]
    pub fn gt_mask(self, other: Self) -> u32 {
        self.mask(other, |a, b| a > b)
    }

    #[inline(always)]
    pub fn lt_mask(self, other: Self) -> u32 {
        self.mask(other, |a, b| a < b)
    }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
impl Add for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] + rhs.0[i]))
    }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
impl Mul for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] * rhs.0[i]))
    }
}

impl F32x4 {
    /// Lane offsets 0, 1, 2, 3 for stepping an edge function along a row.
    #[inline(always)]
    pub fn ramp() -> Self {
        Self::new(0.0, 1.0, 2.0, 3.0)
    }
}

impl std::fmt::Debug for F32x4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("F32x4").field(&self.to_array()).finish()
    }
}
