use pixelflow_image::ImageError;

/// Create a box blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
///
/// # Returns
///
/// A vector of the kernel.
pub fn box_blur_kernel_1d(kernel_size: usize) -> Vec<f32> {
    vec![1.0 / kernel_size as f32; kernel_size]
}

/// Sigma used when the caller does not provide one, derived from the kernel size.
pub fn default_sigma(kernel_size: usize) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel. Non-positive values use [`default_sigma`].
///
/// # Returns
///
/// A normalized vector of the kernel.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        default_sigma(kernel_size)
    };
    let mean = (kernel_size as f32 - 1.0) / 2.0;
    let sigma_sq = sigma * sigma;

    // compute the kernel
    for i in 0..kernel_size {
        let x = i as f32 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Row `n - 1` of Pascal's triangle, the binomial smoothing kernel of size `n`.
fn binomial_kernel(n: usize) -> Vec<f32> {
    let mut row = vec![1.0f32];
    for _ in 1..n {
        let mut next = vec![1.0f32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Create the separable sobel kernels.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel, one of 3, 5 or 7.
///
/// # Returns
///
/// The derivative kernel and the smoothing kernel, in that order.
///
/// # Errors
///
/// Returns an error for any other kernel size.
pub fn sobel_kernel_1d(kernel_size: usize) -> Result<(Vec<f32>, Vec<f32>), ImageError> {
    if !matches!(kernel_size, 3 | 5 | 7) {
        return Err(ImageError::InvalidKernelSize(kernel_size));
    }

    let smooth = binomial_kernel(kernel_size);

    // derivative = binomial(k - 2) convolved with [-1, 0, 1]
    let base = binomial_kernel(kernel_size - 2);
    let mut deriv = vec![0.0f32; kernel_size];
    for (i, &b) in base.iter().enumerate() {
        deriv[i] -= b;
        deriv[i + 2] += b;
    }

    Ok((deriv, smooth))
}
