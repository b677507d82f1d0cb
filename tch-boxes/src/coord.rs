use crate::common::*;

/// Converts boxes from (cx, cy, w, h) form to (xmin, ymin, xmax, ymax) form.
pub fn point_form(boxes: &Tensor) -> Tensor {
    let center = boxes.narrow(-1, 0, 2);
    let size = boxes.narrow(-1, 2, 2);
    Tensor::cat(&[&center - &size / 2.0, &center + &size / 2.0], -1)
}

/// Converts boxes from (xmin, ymin, xmax, ymax) form to (cx, cy, w, h) form.
pub fn center_size(boxes: &Tensor) -> Tensor {
    let top_left = boxes.narrow(-1, 0, 2);
    let bottom_right = boxes.narrow(-1, 2, 2);
    Tensor::cat(&[(&top_left + &bottom_right) / 2.0, &bottom_right - &top_left], -1)
}
