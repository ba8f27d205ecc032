//! Jenks natural breaks (Fisher's exact optimisation over sorted values).

/// Class boundaries for `classes` classes: `[min, upper_1, …, max]`.
/// Adjacent equal boundaries are merged, so fewer classes may come back;
/// at least one class is always returned for non-empty input.
pub fn natural_breaks(values: &[f64], classes: usize) -> Vec<f64> {
    let mut data: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if data.is_empty() { return Vec::new() }
    data.sort_by(f64::total_cmp);

    let n = data.len();
    let mut distinct = data.clone();
    distinct.dedup();
    let k = classes.clamp(1, distinct.len());

    let mut breaks = if k == 1 { vec![data[0], data[n - 1]] } else { fisher_breaks(&data, k) };
    breaks.dedup();
    if breaks.len() < 2 { breaks = vec![data[0], data[n - 1]] }
    breaks
}

/// Dynamic programme minimising the within-class sum of squared deviations.
fn fisher_breaks(data: &[f64], k: usize) -> Vec<f64> {
    let n = data.len();
    // lower[l][j]: 1-based index of the first value in class j when the
    // first l values form j classes. variance[l][j]: the minimal cost.
    let mut lower = vec![vec![0usize; k + 1]; n + 1];
    let mut variance = vec![vec![0.0f64; k + 1]; n + 1];
    for j in 1..=k {
        lower[1][j] = 1;
        for row in variance.iter_mut().skip(2) { row[j] = f64::INFINITY }
    }

    for l in 2..=n {
        let (mut sum, mut sum_sq, mut w) = (0.0, 0.0, 0.0);
        let mut v = 0.0;
        for m in 1..=l {
            let i3 = l - m + 1;
            let val = data[i3 - 1];
            sum_sq += val * val;
            sum += val;
            w += 1.0;
            v = sum_sq - (sum * sum) / w;
            let i4 = i3 - 1;
            if i4 != 0 {
                for j in 2..=k {
                    let cost = v + variance[i4][j - 1];
                    if variance[l][j] >= cost {
                        lower[l][j] = i3;
                        variance[l][j] = cost;
                    }
                }
            }
        }
        lower[l][1] = 1;
        variance[l][1] = v;
    }

    let mut breaks = vec![0.0; k + 1];
    breaks[0] = data[0];
    breaks[k] = data[n - 1];
    let mut upper = n;
    for j in (2..=k).rev() {
        let first = lower[upper][j];
        breaks[j - 1] = data[first - 2];
        upper = first - 1;
    }
    breaks
}

/// Class index of `value`: the first class whose upper boundary is at least
/// `value`. Values above the last boundary fall in the top class.
pub fn bin(breaks: &[f64], value: f64) -> usize {
    let classes = breaks.len().saturating_sub(1);
    breaks.iter().skip(1).position(|&upper| value <= upper).unwrap_or(classes.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolates_an_outlier() {
        let breaks = natural_breaks(&[1.0, 1.0, 1.0, 2.0, 3.0, 100.0], 3);
        assert_eq!(breaks, vec![1.0, 3.0, 100.0]);
        assert_eq!(bin(&breaks, 100.0), 1);
        assert_eq!(bin(&breaks, 3.0), 0);
        assert_eq!(bin(&breaks, 1.0), 0);
    }

    #[test]
    fn separates_clusters() {
        let values = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 50.0, 51.0];
        assert_eq!(natural_breaks(&values, 3), vec![1.0, 3.0, 12.0, 51.0]);
    }

    #[test]
    fn more_classes_than_values() {
        let breaks = natural_breaks(&[4.0, 8.0], 10);
        assert_eq!(breaks, vec![4.0, 8.0]);
    }

    #[test]
    fn constant_input_is_one_class() {
        let breaks = natural_breaks(&[7.0; 5], 4);
        assert_eq!(breaks, vec![7.0, 7.0]);
        assert_eq!(bin(&breaks, 7.0), 0);
    }

    #[test]
    fn empty_input() {
        assert!(natural_breaks(&[], 3).is_empty());
        assert!(natural_breaks(&[f64::NAN], 3).is_empty());
    }
}
