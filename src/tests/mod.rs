//! Сквозные тесты конвейера на заглушках внешних сервисов

mod fakes;
mod test_run;
