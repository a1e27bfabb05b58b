// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/task.rs - 任务编排
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use tracing::info;

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 单次任务：取一帧，推理一次，渲染一次
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成");

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use std::convert::Infallible;
  use std::rc::Rc;

  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Infallible;

    fn infer(&mut self, input: &u32) -> Result<u32, Infallible> {
      Ok(input * 2)
    }
  }

  struct Sink {
    seen: Rc<Cell<Option<(u32, u32)>>>,
  }

  impl Render<u32, u32> for Sink {
    type Error = Infallible;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Infallible> {
      self.seen.set(Some((*frame, *result)));
      Ok(())
    }
  }

  #[test]
  fn runs_single_frame_through_model_and_output() {
    let seen = Rc::new(Cell::new(None));
    let task = OneShotTask;

    task
      .run_task([21u32].into_iter(), Doubler, Sink { seen: seen.clone() })
      .unwrap();

    assert_eq!(seen.get(), Some((21, 42)));
  }

  #[test]
  fn empty_input_is_an_error() {
    let seen = Rc::new(Cell::new(None));
    let result = OneShotTask.run_task(std::iter::empty::<u32>(), Doubler, Sink { seen });
    assert!(result.is_err());
  }
}
