pub mod batch;
pub mod generate;
pub mod images;
pub mod sample;

pub use batch::{
    __path_batch_status, __path_events, __path_palette, __path_start_batch, batch_status, events,
    palette, start_batch, StartBatchRequest, StartBatchResponse,
};
pub use generate::{__path_generate, generate};
pub use images::{
    __path_clear_images, __path_delete_image, __path_get_image, __path_get_result,
    __path_get_source, __path_list_images, __path_set_active_result, __path_upload_image,
    clear_images, delete_image, get_image, get_result, get_source, list_images, set_active_result,
    upload_image, ActiveResultRequest, ClearResponse, CreatedResponse,
};
pub use sample::{
    __path_sample_image, __path_sample_reference, sample_image, sample_reference,
    SampleImageRequest, SamplePoint, SampleResponse,
};
