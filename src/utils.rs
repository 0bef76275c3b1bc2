use burn::tensor::{backend::Backend, Element, ElementConversion, Numeric, Tensor};

/// Largest extent along every axis.
pub fn max_extents<const D: usize>(shapes: &[[usize; D]]) -> [usize; D] {
    shapes.iter().fold([0; D], |mut acc, shape| {
        for (max, extent) in acc.iter_mut().zip(shape.iter()) {
            *max = (*max).max(*extent);
        }
        acc
    })
}

/// How much each axis falls short of the target extents.
pub(crate) fn deficits<const D: usize>(shape: &[usize; D], target: &[usize; D]) -> [usize; D] {
    let mut deficits = [0; D];
    for dim in 0..D {
        deficits[dim] = target[dim].saturating_sub(shape[dim]);
    }
    deficits
}

/// Right-pad every axis of `x` up to `target`, filling with `pad_value`.
///
/// An `x` with an empty axis holds no data, so the result is only padding.
pub fn pad_to_shape<B, const D: usize, K, E>(
    x: Tensor<B, D, K>,
    target: [usize; D],
    pad_value: E,
) -> Tensor<B, D, K>
where
    B: Backend,
    K: Numeric<B>,
    K::Elem: Element,
    E: ElementConversion,
{
    let dims = x.dims();
    let device = x.device();
    let padded = Tensor::<B, D, K>::zeros_device(target, &device).add_scalar(pad_value);

    // slice_assign rejects empty ranges
    if dims.iter().any(|dim| *dim == 0) {
        return padded;
    }

    padded.slice_assign(dims.map(|dim| 0..dim), x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Int;

    type TestBackend = NdArray;

    #[test]
    fn max_extents_is_elementwise() {
        let target = max_extents(&[[2, 3], [4, 1], [2, 2]]);

        assert_eq!(target, [4, 3]);
        assert_eq!(deficits(&[4, 1], &target), [0, 2]);
        assert_eq!(deficits(&[5, 3], &target), [0, 0]);
    }

    #[test]
    fn pad_to_shape_fills_empty_tensors() {
        let x = Tensor::<TestBackend, 2, Int>::zeros([0, 3]);

        let padded = pad_to_shape(x, [2, 3], -100);

        assert_eq!(padded.dims(), [2, 3]);
        assert_eq!(padded.into_data().value, vec![-100; 6]);
    }

    #[test]
    fn pad_to_shape_keeps_data_in_low_indices() {
        let x = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2], [3, 4]]);

        let padded = pad_to_shape(x, [3, 3], -1);

        assert_eq!(padded.dims(), [3, 3]);
        assert_eq!(
            padded.into_data().value,
            vec![1, 2, -1, 3, 4, -1, -1, -1, -1]
        );
    }
}
