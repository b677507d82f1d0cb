use crate::common::*;

/// Pairwise intersection areas between two sets of corner-form boxes,
/// shape `[a.size(0), b.size(0)]`.
pub fn intersect(a: &Tensor, b: &Tensor) -> Tensor {
    let max_xy = a
        .narrow(1, 2, 2)
        .unsqueeze(1)
        .minimum(&b.narrow(1, 2, 2).unsqueeze(0));
    let min_xy = a
        .narrow(1, 0, 2)
        .unsqueeze(1)
        .maximum(&b.narrow(1, 0, 2).unsqueeze(0));
    let sides = (max_xy - min_xy).clamp_min(0.0);
    sides.i((.., .., 0)) * sides.i((.., .., 1))
}

/// Pairwise IoU between two sets of corner-form boxes, shape
/// `[a.size(0), b.size(0)]`.
pub fn jaccard(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    ensure!(
        a.dim() == 2 && a.size()[1] == 4,
        "expect a [_, 4] box tensor, got {:?}",
        a.size()
    );
    ensure!(
        b.dim() == 2 && b.size()[1] == 4,
        "expect a [_, 4] box tensor, got {:?}",
        b.size()
    );

    let inter = intersect(a, b);
    let area_a = ((a.i((.., 2)) - a.i((.., 0))) * (a.i((.., 3)) - a.i((.., 1)))).unsqueeze(1);
    let area_b = ((b.i((.., 2)) - b.i((.., 0))) * (b.i((.., 3)) - b.i((.., 1)))).unsqueeze(0);
    let union = area_a + area_b - &inter;
    Ok(inter / union)
}
