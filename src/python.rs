//! 파이썬 바인딩 (pyo3 + numpy)

use crate::error::Error;
use crate::ops;
use crate::precision::ButterflyScalar;
use numpy::{Complex32, Element, IntoPyArray, PyArray3, PyReadonlyArray3, PyReadonlyArray6};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

type MultiplyOutput<'py, T> = (&'py PyArray3<T>, Vec<&'py PyArray3<T>>, Vec<&'py PyArray3<T>>);

fn to_py_err(e: Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn multiply_impl<'py, T: ButterflyScalar + Element>(
    py: Python<'py>,
    twiddle: PyReadonlyArray6<'py, T>,
    input: PyReadonlyArray3<'py, T>,
    increasing_stride: bool,
    output_size: Option<usize>,
) -> PyResult<MultiplyOutput<'py, T>> {
    let trace = ops::butterfly_multiply(
        &twiddle.as_array().to_owned(),
        &input.as_array().to_owned(),
        increasing_stride,
        output_size,
    )
    .map_err(to_py_err)?;
    Ok((
        trace.output.into_pyarray(py),
        trace
            .activations
            .into_iter()
            .map(|a| a.into_pyarray(py))
            .collect(),
        trace.weights.into_iter().map(|w| w.into_pyarray(py)).collect(),
    ))
}

fn reorder_impl<'py, T: ButterflyScalar + Element>(
    py: Python<'py>,
    weights: Vec<PyReadonlyArray3<'py, T>>,
    length: usize,
    bu_parallelism: usize,
) -> PyResult<Vec<&'py PyArray3<T>>> {
    let mut owned: Vec<_> = weights.iter().map(|w| w.as_array().to_owned()).collect();
    ops::reorder_weights(&mut owned, length, bu_parallelism).map_err(to_py_err)?;
    Ok(owned.into_iter().map(|w| w.into_pyarray(py)).collect())
}

/// 실수 버터플라이 곱셈. (output, 단계별 활성값, 단계별 가중치)
#[pyfunction]
#[pyo3(signature = (twiddle, input, increasing_stride=true, output_size=None))]
fn butterfly_multiply<'py>(
    py: Python<'py>,
    twiddle: PyReadonlyArray6<'py, f32>,
    input: PyReadonlyArray3<'py, f32>,
    increasing_stride: bool,
    output_size: Option<usize>,
) -> PyResult<MultiplyOutput<'py, f32>> {
    multiply_impl(py, twiddle, input, increasing_stride, output_size)
}

/// 복소 버터플라이 곱셈 (complex64)
#[pyfunction]
#[pyo3(signature = (twiddle, input, increasing_stride=true, output_size=None))]
fn butterfly_multiply_complex<'py>(
    py: Python<'py>,
    twiddle: PyReadonlyArray6<'py, Complex32>,
    input: PyReadonlyArray3<'py, Complex32>,
    increasing_stride: bool,
    output_size: Option<usize>,
) -> PyResult<MultiplyOutput<'py, Complex32>> {
    multiply_impl(py, twiddle, input, increasing_stride, output_size)
}

/// 가중치를 BRAM 레이아웃으로 변환
#[pyfunction]
fn reorder_weight<'py>(
    py: Python<'py>,
    weights: Vec<PyReadonlyArray3<'py, f32>>,
    length: usize,
    bu_parallelism: usize,
) -> PyResult<Vec<&'py PyArray3<f32>>> {
    reorder_impl(py, weights, length, bu_parallelism)
}

#[pyfunction]
fn reorder_weight_complex<'py>(
    py: Python<'py>,
    weights: Vec<PyReadonlyArray3<'py, Complex32>>,
    length: usize,
    bu_parallelism: usize,
) -> PyResult<Vec<&'py PyArray3<Complex32>>> {
    reorder_impl(py, weights, length, bu_parallelism)
}

#[pymodule]
fn bfly_npu(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(butterfly_multiply, m)?)?;
    m.add_function(wrap_pyfunction!(butterfly_multiply_complex, m)?)?;
    m.add_function(wrap_pyfunction!(reorder_weight, m)?)?;
    m.add_function(wrap_pyfunction!(reorder_weight_complex, m)?)?;
    Ok(())
}
